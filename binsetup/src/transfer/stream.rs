//! Single-stream transfer for servers without Range support.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::time::Instant;

use tracing::{debug, info};

use super::http::HttpSource;
use super::progress::{
    SpeedMeter, TransferProgress, TransferProgressCallback, CHUNKED_SPEED_WINDOW,
    STREAM_REPORT_INTERVAL,
};
use super::{publish_staged, TransferControl, TransferResult, TransferTarget};
use crate::error::{FetchError, FetchResult};

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Non-resumable transfer of the whole body in one request.
///
/// Any partial staging file is truncated first, since there is no way to
/// continue it. Pause requests are ignored; only abort stops the stream.
pub struct StreamTransfer<'a> {
    source: &'a dyn HttpSource,
}

impl<'a> StreamTransfer<'a> {
    pub fn new(source: &'a dyn HttpSource) -> Self {
        Self { source }
    }

    /// Stream the target into its staging file and publish it.
    ///
    /// `known_total` is the probed length (0 if unknown); the response's own
    /// `Content-Length` is used when the probe found nothing.
    pub fn run(
        &self,
        target: &TransferTarget,
        known_total: u64,
        control: &TransferControl,
        on_progress: &TransferProgressCallback,
    ) -> FetchResult<TransferResult> {
        let url = target.source_url();
        let staging = target.staging_path();

        control.check_abort(url)?;
        let response = self.source.get(url)?;
        if !(200..300).contains(&response.status) {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let declared = response.content_length;
        let total_bytes = if known_total > 0 {
            known_total
        } else {
            declared.unwrap_or(0)
        };

        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(staging).map_err(|e| FetchError::WriteFailed {
            path: staging.to_path_buf(),
            source: e,
        })?;

        debug!(url, total_bytes, "starting streaming transfer");

        let mut reader = response.body;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut loaded = 0u64;
        let mut meter = SpeedMeter::new(CHUNKED_SPEED_WINDOW, 0);
        let mut last_report = Instant::now();

        let snapshot = |loaded_bytes: u64, speed_bps: f64| TransferProgress {
            loaded_bytes,
            total_bytes,
            speed_bps,
            chunk_index: 0,
            total_chunks: 1,
            resumable: false,
        };

        loop {
            control.check_abort(url)?;

            let bytes_read = reader
                .read(&mut buffer)
                .map_err(|e| read_error(url, self.source.timeout_secs(), e))?;
            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| FetchError::WriteFailed {
                    path: staging.to_path_buf(),
                    source: e,
                })?;
            loaded += bytes_read as u64;

            let speed_bps = meter.sample(loaded);
            if last_report.elapsed() >= STREAM_REPORT_INTERVAL {
                on_progress(&snapshot(loaded, speed_bps));
                last_report = Instant::now();
            }
        }

        let file = writer.into_inner().map_err(|e| FetchError::WriteFailed {
            path: staging.to_path_buf(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|e| FetchError::WriteFailed {
            path: staging.to_path_buf(),
            source: e,
        })?;
        drop(file);

        if let Some(expected) = declared {
            if loaded < expected {
                return Err(FetchError::Truncated {
                    url: url.to_string(),
                    expected,
                    received: loaded,
                });
            }
        }

        on_progress(&snapshot(loaded, meter.rate()));

        publish_staged(staging, target.destination_path())?;
        info!(url, bytes = loaded, "download complete");

        Ok(TransferResult {
            completed: true,
            total_bytes_written: loaded,
            resume_offset: loaded,
        })
    }
}

/// Map a body read failure, keeping client timeouts distinct.
fn read_error(url: &str, timeout_secs: u64, e: io::Error) -> FetchError {
    let timed_out = e.kind() == io::ErrorKind::TimedOut
        || e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);

    if timed_out {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_secs,
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            reason: format!("Read error: {}", e),
        }
    }
}
