//! CLI error type.

use binsetup::{ErrorKind, FetchError};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A download or install step failed.
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// Bad arguments or configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// One or more artifacts in a batch failed.
    #[error("{failed} of {total} installs failed")]
    Batch { failed: usize, total: usize },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Fetch(e) => match e.kind() {
                ErrorKind::Cancelled => 130,
                ErrorKind::Config => 2,
                _ => 1,
            },
            Self::Config(_) => 2,
            Self::Batch { .. } => 1,
        }
    }

    /// A hint printed under the error message, if one helps.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Fetch(e) if e.is_resumable() => {
                Some("The partial download was kept; run the command again to resume.")
            }
            Self::Fetch(e) if e.kind() == ErrorKind::Integrity => {
                Some("The download was corrupt or tampered with and has been deleted.")
            }
            Self::Fetch(e) if e.kind() == ErrorKind::Packaging => {
                Some("The published bundle looks broken; retrying will not help until it is fixed upstream.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let aborted = CliError::from(FetchError::Aborted {
            url: "http://a".to_string(),
        });
        assert_eq!(aborted.exit_code(), 130);
        assert_eq!(CliError::Config("bad".to_string()).exit_code(), 2);
        assert_eq!(CliError::Batch { failed: 1, total: 2 }.exit_code(), 1);
    }

    #[test]
    fn test_hints() {
        let network = CliError::from(FetchError::Http {
            url: "http://a".to_string(),
            reason: "reset".to_string(),
        });
        assert!(network.hint().unwrap().contains("resume"));

        let mismatch = CliError::from(FetchError::ChecksumMismatch {
            filename: "yt-dlp".to_string(),
            expected: "a".to_string(),
            actual: "b".to_string(),
        });
        assert!(mismatch.hint().unwrap().contains("deleted"));
        assert!(CliError::Config("x".to_string()).hint().is_none());
    }
}
