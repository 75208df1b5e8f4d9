//! Error types for transfers and installs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for fetch and install operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while fetching or installing an artifact.
///
/// Every variant except [`FetchError::ChecksumMismatch`] leaves any staging
/// file on disk, so the next attempt resumes from where this one stopped.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("failed to download {url}: {reason}")]
    Http { url: String, reason: String },

    /// The request layer gave up waiting.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a status the engine cannot use.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// A range-capable server returned the full body for a partial request.
    #[error("server ignored Range bytes={start}-{end} for {url} (status 200)")]
    RangeNotHonored { url: String, start: u64, end: u64 },

    /// A ranged response body had an unusable length.
    #[error("invalid body for bytes={start}-{end} from {url}: got {received} bytes")]
    InvalidRangeBody {
        url: String,
        start: u64,
        end: u64,
        received: u64,
    },

    /// A streamed body ended before its declared length.
    #[error("download of {url} ended early: {received} of {expected} bytes")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// The downloaded content does not match its published digest.
    #[error(
        "Security Alert: checksum mismatch for {filename} (expected {expected}, got {actual}); \
         the corrupt file was deleted"
    )]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// A checksum manifest was configured but could not provide a digest.
    #[error("checksum for {filename} unavailable from {manifest_url}: {reason}")]
    ChecksumUnavailable {
        filename: String,
        manifest_url: String,
        reason: String,
    },

    /// A required entry is absent from a downloaded archive.
    #[error("could not find {entry} in archive {}", archive.display())]
    MissingArchiveEntry { archive: PathBuf, entry: String },

    /// The archive could not be read or unpacked.
    #[error("failed to extract {}: {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// The caller aborted the transfer.
    #[error("download of {url} aborted")]
    Aborted { url: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of a [`FetchError`] for user-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient transport problem; retrying resumes the download.
    Network,
    /// Content failed verification.
    Integrity,
    /// The published bundle is unusable; retrying will not help.
    Packaging,
    /// Local disk problem.
    Filesystem,
    /// The caller aborted.
    Cancelled,
    /// Bad settings.
    Config,
}

impl FetchError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { .. }
            | Self::Timeout { .. }
            | Self::UnexpectedStatus { .. }
            | Self::RangeNotHonored { .. }
            | Self::InvalidRangeBody { .. }
            | Self::Truncated { .. }
            | Self::ChecksumUnavailable { .. } => ErrorKind::Network,
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::MissingArchiveEntry { .. } | Self::ExtractionFailed { .. } => {
                ErrorKind::Packaging
            }
            Self::ReadFailed { .. } | Self::WriteFailed { .. } | Self::CreateDirFailed { .. } => {
                ErrorKind::Filesystem
            }
            Self::Aborted { .. } => ErrorKind::Cancelled,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Whether a subsequent attempt can pick up the partial download.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Cancelled | ErrorKind::Filesystem
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = FetchError::ChecksumMismatch {
            filename: "yt-dlp".to_string(),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("Security Alert"));
        assert!(text.contains("abc123"));
        assert!(text.contains("def456"));
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(!err.is_resumable());
    }

    #[test]
    fn test_range_not_honored_display() {
        let err = FetchError::RangeNotHonored {
            url: "http://example.com/f".to_string(),
            start: 1000,
            end: 1999,
        };
        assert_eq!(
            err.to_string(),
            "server ignored Range bytes=1000-1999 for http://example.com/f (status 200)"
        );
        assert!(err.is_resumable());
    }

    #[test]
    fn test_kind_classification() {
        let missing = FetchError::MissingArchiveEntry {
            archive: PathBuf::from("/tmp/ffmpeg.zip"),
            entry: "ffmpeg".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::Packaging);
        assert!(!missing.is_resumable());

        let aborted = FetchError::Aborted {
            url: "http://a".to_string(),
        };
        assert_eq!(aborted.kind(), ErrorKind::Cancelled);

        let io_err = FetchError::WriteFailed {
            path: PathBuf::from("/x"),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(io_err.kind(), ErrorKind::Filesystem);
        assert!(io_err.to_string().contains("disk full"));
    }
}
