//! Resumable HTTP transfers into staging files.
//!
//! This module provides the download half of an install:
//! - Size and Range-capability discovery (`probe`)
//! - Windowed, pausable transfers for range-capable servers (`chunked`)
//! - Single-stream transfers for everything else (`stream`)
//! - Progress snapshots and speed estimation (`progress`)
//! - The request layer seam (`http`)
//!
//! # Resume model
//!
//! A transfer writes into `<destination>.part`. The byte length of that file
//! is the only resume state: each window is appended, flushed and synced
//! before the offset advances, so the next run simply continues from the
//! file's length.
//!
//! ```text
//! probe ──► supports_range && total > 0 ──► ChunkedTransfer (pausable)
//!       └─► otherwise ─────────────────────► StreamTransfer  (not pausable)
//!                                   both ──► publish .part → destination
//! ```

mod chunked;
mod http;
mod probe;
mod progress;
mod stream;

pub use chunked::{default_window_size, ChunkedTransfer};
pub use http::{HeadInfo, HttpSource, RangeResponse, ReqwestSource, StreamResponse};
pub use http::DEFAULT_TIMEOUT_SECS;
pub use probe::{parse_content_range_start, parse_content_range_total, probe, ProbeResult};
pub use progress::{SpeedMeter, TransferProgress, TransferProgressCallback};
pub use stream::StreamTransfer;

#[cfg(test)]
pub(crate) use http::tests::MockSource;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{FetchError, FetchResult};

/// Suffix appended to a destination file name to form its staging path.
pub const STAGING_SUFFIX: &str = ".part";

/// One download: where it comes from and where it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTarget {
    source_url: String,
    destination_path: PathBuf,
    staging_path: PathBuf,
    expected_checksum: Option<String>,
}

impl TransferTarget {
    /// Create a target; the staging path is derived from the destination.
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        let destination_path = destination_path.into();
        Self {
            source_url: source_url.into(),
            staging_path: staging_path_for(&destination_path),
            destination_path,
            expected_checksum: None,
        }
    }

    /// Attach an expected SHA-256 digest.
    pub fn with_checksum(mut self, checksum: Option<String>) -> Self {
        self.expected_checksum = checksum;
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn expected_checksum(&self) -> Option<&str> {
        self.expected_checksum.as_deref()
    }

    /// Bytes already staged by a previous run (0 if none).
    pub fn staged_bytes(&self) -> u64 {
        fs::metadata(&self.staging_path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Outcome of one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    /// False means paused, not failed.
    pub completed: bool,
    /// Bytes on disk when the attempt ended.
    pub total_bytes_written: u64,
    /// Offset the next attempt starts from.
    pub resume_offset: u64,
}

/// Cooperative pause and abort signals shared with a running transfer.
///
/// Cloning yields another handle to the same flags.
#[derive(Debug, Clone, Default)]
pub struct TransferControl {
    paused: Arc<AtomicBool>,
    aborted: Arc<AtomicBool>,
}

impl TransferControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the transfer to stop at the next window boundary.
    pub fn request_pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Clear a pause request before starting the next run.
    pub fn clear_pause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Terminate the transfer at the next suspension point.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn check_abort(&self, url: &str) -> FetchResult<()> {
        if self.is_aborted() {
            return Err(FetchError::Aborted {
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

/// Staging path for a destination: the file name with [`STAGING_SUFFIX`] appended.
pub fn staging_path_for(destination: &Path) -> PathBuf {
    let mut name: OsString = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(STAGING_SUFFIX);
    destination.with_file_name(name)
}

/// Promote a completed staging file to its destination.
///
/// Any existing destination is removed first. When the rename cannot be done
/// (e.g. across filesystems) the staging file is copied and then removed.
pub fn publish_staged(staging: &Path, destination: &Path) -> FetchResult<()> {
    if destination.exists() {
        fs::remove_file(destination).map_err(|e| FetchError::WriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;
    }

    if let Err(rename_err) = fs::rename(staging, destination) {
        debug!(
            staging = %staging.display(),
            error = %rename_err,
            "rename failed, copying staged file instead"
        );
        fs::copy(staging, destination).map_err(|e| FetchError::WriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;
        fs::remove_file(staging).map_err(|e| FetchError::WriteFailed {
            path: staging.to_path_buf(),
            source: e,
        })?;
    }

    Ok(())
}
