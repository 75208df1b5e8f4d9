//! SHA-256 verification of downloaded artifacts.
//!
//! This module computes file digests, compares them against published values
//! and parses `SHA2-256SUMS` style manifests.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{FetchError, FetchResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate SHA-256 checksum of a file.
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the file contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn calculate_file_checksum(path: &Path) -> FetchResult<String> {
    let mut file = File::open(path).map_err(|e| FetchError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| FetchError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether two hex digests are equal, ignoring case and surrounding whitespace.
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// Verify that a file matches an expected checksum.
///
/// The file is left in place either way; see [`verify_or_discard`].
pub fn verify_checksum(path: &Path, expected: &str) -> FetchResult<()> {
    let actual = calculate_file_checksum(path)?;
    if !checksums_match(expected, &actual) {
        return Err(FetchError::ChecksumMismatch {
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            expected: expected.trim().to_lowercase(),
            actual,
        });
    }
    Ok(())
}

/// Verify a downloaded file, deleting it when the digest does not match.
///
/// With no expected digest the file is accepted as-is.
pub fn verify_or_discard(path: &Path, expected: Option<&str>) -> FetchResult<()> {
    let Some(expected) = expected else {
        info!(
            path = %path.display(),
            "no checksum published, installing without integrity verification"
        );
        return Ok(());
    };

    match verify_checksum(path, expected) {
        Ok(()) => {
            info!(path = %path.display(), "checksum verified");
            Ok(())
        }
        Err(err @ FetchError::ChecksumMismatch { .. }) => {
            warn!(path = %path.display(), "checksum mismatch, deleting download");
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to delete corrupt download");
            }
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Digests parsed from a checksum manifest.
///
/// Lines look like `<hex>  <name>` or `<hex> *<name>` (binary mode marker).
/// Blank lines and `#` comments are skipped, as are lines without a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: HashMap<String, String>,
}

impl ChecksumManifest {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (digest, name) = line.split_once(char::is_whitespace)?;
                let name = name.trim_start().trim_start_matches('*').trim();
                if name.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                Some((name.to_string(), digest.to_lowercase()))
            })
            .collect();

        Self { entries }
    }

    /// Digest listed for `file_name`.
    pub fn lookup(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
