//! Windowed, pausable transfer for range-capable servers.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};

use super::http::{HttpSource, RangeResponse};
use super::probe::parse_content_range_start;
use super::progress::{
    SpeedMeter, TransferProgress, TransferProgressCallback, CHUNKED_SPEED_WINDOW,
};
use super::{publish_staged, TransferControl, TransferResult, TransferTarget};
use crate::error::{FetchError, FetchResult};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Window size used for large artifacts.
pub const DEFAULT_WINDOW_SIZE: u64 = 2 * MIB;

/// Pick a window size for an artifact of `total_bytes`.
///
/// Small files get small windows so a pause request is honoured quickly;
/// large ones get bigger windows to cut per-request overhead.
pub fn default_window_size(total_bytes: u64) -> u64 {
    if total_bytes < 16 * MIB {
        512 * KIB
    } else if total_bytes < 64 * MIB {
        MIB
    } else {
        DEFAULT_WINDOW_SIZE
    }
}

/// Sequential range-window downloader.
///
/// Windows are fetched strictly in order and each one is synced to disk
/// before the offset advances, so the staging file length is always a valid
/// resume point. Pause is only honoured between windows.
pub struct ChunkedTransfer<'a> {
    source: &'a dyn HttpSource,
    window_size: u64,
}

impl<'a> ChunkedTransfer<'a> {
    /// Create an engine fetching `window_size` bytes per request.
    pub fn new(source: &'a dyn HttpSource, window_size: u64) -> Self {
        Self {
            source,
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Transfer `[staged_bytes, total_bytes)` of the target.
    ///
    /// Returns `completed: false` when a pause was requested; the staging
    /// file then holds exactly `resume_offset` bytes. On success the staging
    /// file has been published to the destination.
    pub fn run(
        &self,
        target: &TransferTarget,
        total_bytes: u64,
        control: &TransferControl,
        on_progress: &TransferProgressCallback,
    ) -> FetchResult<TransferResult> {
        let url = target.source_url();
        let staging = target.staging_path();

        if total_bytes == 0 {
            return Err(FetchError::InvalidConfig(format!(
                "chunked transfer of {} requires a known length",
                url
            )));
        }

        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut start = target.staged_bytes();
        if start > total_bytes {
            warn!(
                staging = %staging.display(),
                staged = start,
                total_bytes,
                "staging file is larger than the resource, restarting"
            );
            start = 0;
        } else if start > 0 {
            info!(url, offset = start, "resuming partial download");
        }

        let mut file = open_staging(staging, start)?;
        let total_chunks = (total_bytes - start).div_ceil(self.window_size);
        let mut current = start;
        let mut chunk_index = 0u64;
        let mut meter = SpeedMeter::new(CHUNKED_SPEED_WINDOW, start);

        debug!(
            url,
            total_bytes,
            window_size = self.window_size,
            total_chunks,
            "starting chunked transfer"
        );

        while current < total_bytes {
            control.check_abort(url)?;
            if control.is_paused() {
                drop(file);
                info!(url, offset = current, "download paused");
                return Ok(TransferResult {
                    completed: false,
                    total_bytes_written: current,
                    resume_offset: current,
                });
            }

            let end = current
                .saturating_add(self.window_size - 1)
                .min(total_bytes - 1);
            let response = self.source.get_range(url, current, end)?;
            let body = check_window(url, current, end, total_bytes, response)?;

            write_window(&mut file, staging, &body)?;
            current += body.len() as u64;
            chunk_index += 1;

            let speed_bps = meter.sample(current);
            on_progress(&TransferProgress {
                loaded_bytes: current,
                total_bytes,
                speed_bps,
                chunk_index,
                total_chunks,
                resumable: true,
            });
        }

        drop(file);
        publish_staged(staging, target.destination_path())?;
        info!(url, bytes = current, "download complete");

        Ok(TransferResult {
            completed: true,
            total_bytes_written: current,
            resume_offset: current,
        })
    }
}

/// Open the staging file: append to a partial one, or start a fresh one.
fn open_staging(path: &Path, start: u64) -> FetchResult<File> {
    let result = if start > 0 {
        OpenOptions::new().append(true).open(path)
    } else {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    };

    result.map_err(|e| FetchError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Validate a window response and hand back its body.
fn check_window(
    url: &str,
    start: u64,
    end: u64,
    total_bytes: u64,
    response: RangeResponse,
) -> FetchResult<Vec<u8>> {
    match response.status {
        206 => {}
        // A full body is only acceptable when the window is the whole resource.
        200 if start == 0 && end + 1 == total_bytes => {}
        200 => {
            return Err(FetchError::RangeNotHonored {
                url: url.to_string(),
                start,
                end,
            })
        }
        status => {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status,
            })
        }
    }

    // A 206 for some other span would be appended at the wrong offset.
    if response.status == 206 {
        if let Some(served) = response
            .content_range
            .as_deref()
            .and_then(parse_content_range_start)
        {
            if served != start {
                return Err(FetchError::InvalidRangeBody {
                    url: url.to_string(),
                    start,
                    end,
                    received: response.body.len() as u64,
                });
            }
        }
    }

    let received = response.body.len() as u64;
    if received == 0 || received > end - start + 1 {
        return Err(FetchError::InvalidRangeBody {
            url: url.to_string(),
            start,
            end,
            received,
        });
    }

    Ok(response.body)
}

/// Append one window and make it durable.
fn write_window(file: &mut File, path: &Path, body: &[u8]) -> FetchResult<()> {
    let map = |e: std::io::Error| FetchError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    file.write_all(body).map_err(map)?;
    file.flush().map_err(map)?;
    file.sync_data().map_err(map)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::MockSource;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn no_progress(_: &TransferProgress) {}

    #[test]
    fn test_default_window_size_scales_with_artifact() {
        assert_eq!(default_window_size(3 * MIB), 512 * KIB);
        assert_eq!(default_window_size(30 * MIB), MIB);
        assert_eq!(default_window_size(120 * MIB), 2 * MIB);
    }

    #[test]
    fn test_ten_windows_without_gaps_or_overlaps() {
        let temp = TempDir::new().unwrap();
        let data = payload(10_000_000);
        let mock = MockSource::new(data.clone());
        let target = TransferTarget::new("http://mock/ffmpeg.zip", temp.path().join("ffmpeg.zip"));
        let engine = ChunkedTransfer::new(&mock, 1_000_000);

        let result = engine
            .run(&target, 10_000_000, &TransferControl::new(), &no_progress)
            .unwrap();

        assert!(result.completed);
        assert_eq!(result.total_bytes_written, 10_000_000);

        let expected: Vec<(u64, u64)> = (0..10)
            .map(|i| (i * 1_000_000, i * 1_000_000 + 999_999))
            .collect();
        assert_eq!(mock.requested_ranges(), expected);

        assert_eq!(fs::read(target.destination_path()).unwrap(), data);
        assert!(!target.staging_path().exists());
    }

    #[test]
    fn test_pause_after_three_windows_then_resume() {
        let temp = TempDir::new().unwrap();
        let data = payload(10_000_000);
        let target = TransferTarget::new("http://mock/ffmpeg.zip", temp.path().join("ffmpeg.zip"));
        let control = TransferControl::new();

        let first = MockSource::new(data.clone());
        let pause_after_three = |p: &TransferProgress| {
            if p.chunk_index == 3 {
                control.request_pause();
            }
        };
        let result = ChunkedTransfer::new(&first, 1_000_000)
            .run(&target, 10_000_000, &control, &pause_after_three)
            .unwrap();

        assert_eq!(
            result,
            TransferResult {
                completed: false,
                total_bytes_written: 3_000_000,
                resume_offset: 3_000_000,
            }
        );
        assert_eq!(target.staged_bytes(), 3_000_000);
        assert!(!target.destination_path().exists());

        control.clear_pause();
        let second = MockSource::new(data.clone());
        let result = ChunkedTransfer::new(&second, 1_000_000)
            .run(&target, 10_000_000, &control, &no_progress)
            .unwrap();

        assert!(result.completed);
        let ranges = second.requested_ranges();
        assert_eq!(ranges.len(), 7);
        assert_eq!(ranges[0], (3_000_000, 3_999_999));
        assert_eq!(ranges[6], (9_000_000, 9_999_999));
        assert_eq!(fs::read(target.destination_path()).unwrap(), data);
    }

    #[test]
    fn test_ignored_range_mid_transfer_fails_fast() {
        let temp = TempDir::new().unwrap();
        let mut mock = MockSource::new(payload(5000));
        mock.ignore_range_at = Some(2);
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));

        let result = ChunkedTransfer::new(&mock, 1000).run(
            &target,
            5000,
            &TransferControl::new(),
            &no_progress,
        );

        assert!(matches!(
            result,
            Err(FetchError::RangeNotHonored {
                start: 2000,
                end: 2999,
                ..
            })
        ));
        assert_eq!(target.staged_bytes(), 2000);
        assert!(!target.destination_path().exists());
    }

    #[test]
    fn test_full_body_accepted_for_single_window() {
        let temp = TempDir::new().unwrap();
        let data = payload(100);
        let mock = MockSource::without_ranges(data.clone());
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));

        let result = ChunkedTransfer::new(&mock, 1000)
            .run(&target, 100, &TransferControl::new(), &no_progress)
            .unwrap();

        assert!(result.completed);
        assert_eq!(fs::read(target.destination_path()).unwrap(), data);
    }

    #[test]
    fn test_network_error_keeps_staging() {
        let temp = TempDir::new().unwrap();
        let mut mock = MockSource::new(payload(4000));
        mock.fail_range_at = Some(1);
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));

        let result = ChunkedTransfer::new(&mock, 1000).run(
            &target,
            4000,
            &TransferControl::new(),
            &no_progress,
        );

        assert!(matches!(result, Err(FetchError::Http { .. })));
        assert_eq!(target.staged_bytes(), 1000);
    }

    #[test]
    fn test_abort_keeps_staging() {
        let temp = TempDir::new().unwrap();
        let mock = MockSource::new(payload(4000));
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));
        let control = TransferControl::new();
        let abort_after_two = |p: &TransferProgress| {
            if p.chunk_index == 2 {
                control.abort();
            }
        };

        let result = ChunkedTransfer::new(&mock, 1000).run(&target, 4000, &control, &abort_after_two);

        assert!(matches!(result, Err(FetchError::Aborted { .. })));
        assert_eq!(target.staged_bytes(), 2000);
        assert_eq!(mock.requested_ranges().len(), 2);
    }

    #[test]
    fn test_progress_is_monotonic_and_reaches_total() {
        let temp = TempDir::new().unwrap();
        let mock = MockSource::new(payload(2500));
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));
        let seen = Mutex::new(Vec::new());
        let record = |p: &TransferProgress| seen.lock().unwrap().push(*p);

        ChunkedTransfer::new(&mock, 1000)
            .run(&target, 2500, &TransferControl::new(), &record)
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0].loaded_bytes <= w[1].loaded_bytes));
        assert_eq!(seen.last().unwrap().loaded_bytes, 2500);
        assert!(seen.iter().all(|p| p.resumable && p.total_chunks == 3));
    }

    #[test]
    fn test_oversized_staging_restarts() {
        let temp = TempDir::new().unwrap();
        let data = payload(1500);
        let mock = MockSource::new(data.clone());
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));
        fs::write(target.staging_path(), vec![9u8; 4000]).unwrap();

        ChunkedTransfer::new(&mock, 1000)
            .run(&target, 1500, &TransferControl::new(), &no_progress)
            .unwrap();

        assert_eq!(mock.requested_ranges(), vec![(0, 999), (1000, 1499)]);
        assert_eq!(fs::read(target.destination_path()).unwrap(), data);
    }

    #[test]
    fn test_unknown_length_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mock = MockSource::new(payload(10));
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));

        let result = ChunkedTransfer::new(&mock, 1000).run(
            &target,
            0,
            &TransferControl::new(),
            &no_progress,
        );
        assert!(matches!(result, Err(FetchError::InvalidConfig(_))));
    }

    #[test]
    fn test_huge_window_resumes_without_overflow() {
        let temp = TempDir::new().unwrap();
        let data = payload(100);
        let mock = MockSource::new(data.clone());
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));
        fs::write(target.staging_path(), &data[..50]).unwrap();

        let result = ChunkedTransfer::new(&mock, u64::MAX)
            .run(&target, 100, &TransferControl::new(), &no_progress)
            .unwrap();

        assert!(result.completed);
        assert_eq!(mock.requested_ranges(), vec![(50, 99)]);
        assert_eq!(fs::read(target.destination_path()).unwrap(), data);
    }

    fn canned(status: u16, content_range: Option<&str>, body: Vec<u8>) -> RangeResponse {
        RangeResponse {
            status,
            content_range: content_range.map(str::to_string),
            body,
        }
    }

    fn run_with_response_at(
        index: usize,
        response: RangeResponse,
    ) -> (FetchResult<TransferResult>, TransferTarget, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut mock = MockSource::new(payload(3000));
        mock.respond_at = Some((index, response));
        let target = TransferTarget::new("http://mock/f", temp.path().join("f"));

        let result = ChunkedTransfer::new(&mock, 1000).run(
            &target,
            3000,
            &TransferControl::new(),
            &no_progress,
        );
        (result, target, temp)
    }

    #[test]
    fn test_server_error_mid_transfer_keeps_staging() {
        let (result, target, _temp) = run_with_response_at(1, canned(500, None, Vec::new()));

        assert!(matches!(
            result,
            Err(FetchError::UnexpectedStatus { status: 500, .. })
        ));
        assert_eq!(target.staged_bytes(), 1000);
        assert!(!target.destination_path().exists());
    }

    #[test]
    fn test_range_not_satisfiable_is_unexpected_status() {
        let (result, target, _temp) =
            run_with_response_at(0, canned(416, Some("bytes */3000"), Vec::new()));

        assert!(matches!(
            result,
            Err(FetchError::UnexpectedStatus { status: 416, .. })
        ));
        assert_eq!(target.staged_bytes(), 0);
    }

    #[test]
    fn test_empty_window_body_is_rejected() {
        let (result, target, _temp) =
            run_with_response_at(1, canned(206, Some("bytes 1000-1999/3000"), Vec::new()));

        assert!(matches!(
            result,
            Err(FetchError::InvalidRangeBody {
                start: 1000,
                received: 0,
                ..
            })
        ));
        assert_eq!(target.staged_bytes(), 1000);
    }

    #[test]
    fn test_oversized_window_body_is_rejected() {
        let (result, target, _temp) = run_with_response_at(
            1,
            canned(206, Some("bytes 1000-2499/3000"), vec![0u8; 1500]),
        );

        assert!(matches!(
            result,
            Err(FetchError::InvalidRangeBody {
                start: 1000,
                end: 1999,
                received: 1500,
                ..
            })
        ));
        assert_eq!(target.staged_bytes(), 1000);
    }

    #[test]
    fn test_window_served_from_wrong_offset_is_rejected() {
        let (result, target, _temp) = run_with_response_at(
            1,
            canned(206, Some("bytes 0-999/3000"), payload(1000)),
        );

        assert!(matches!(
            result,
            Err(FetchError::InvalidRangeBody { start: 1000, .. })
        ));
        assert_eq!(target.staged_bytes(), 1000);
        assert!(!target.destination_path().exists());
    }
}
