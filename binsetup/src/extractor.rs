//! Archive extraction for bundled binaries.
//!
//! This module handles:
//! - Pulling named entries out of zip bundles (via the `zip` crate)
//! - Unpacking tar.gz / tar.xz bundles with the system `tar` tool
//! - Reporting required entries that the bundle does not contain
//!
//! Entries are matched on their final path component and always written as
//! `<dest_dir>/<name>`, so nothing in the archive can choose where a file
//! lands.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchResult};
use crate::transfer::{publish_staged, staging_path_for};

/// Container format of a downloaded bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
}

impl ArchiveFormat {
    /// Guess the format from a URL or file name.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else {
            None
        }
    }

    /// Conventional file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
        }
    }

    /// Parse a config-file identifier (`zip`, `tar.gz`, `tar.xz`).
    pub fn parse(value: &str) -> FetchResult<Self> {
        Self::from_name(&format!(".{}", value.trim())).ok_or_else(|| {
            FetchError::InvalidConfig(format!(
                "unknown archive format '{}' (expected zip, tar.gz or tar.xz)",
                value
            ))
        })
    }
}

/// A file to pull out of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File name to match against the last component of each archive path.
    pub name: String,
    /// Whether a bundle without this entry is unusable.
    pub required: bool,
}

impl ArchiveEntry {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// Extract `entries` from `archive` into `dest_dir`.
///
/// Returns the paths written, in the order of `entries`. A missing optional
/// entry is skipped; a missing required one fails with
/// [`FetchError::MissingArchiveEntry`].
pub fn extract_entries(
    archive: &Path,
    format: ArchiveFormat,
    entries: &[ArchiveEntry],
    dest_dir: &Path,
) -> FetchResult<Vec<PathBuf>> {
    fs::create_dir_all(dest_dir).map_err(|e| FetchError::CreateDirFailed {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;

    debug!(
        archive = %archive.display(),
        ?format,
        entries = entries.len(),
        "extracting archive"
    );

    let found = match format {
        ArchiveFormat::Zip => extract_zip(archive, entries, dest_dir)?,
        ArchiveFormat::TarGz | ArchiveFormat::TarXz => {
            extract_tar(archive, format, entries, dest_dir)?
        }
    };

    let mut installed = Vec::with_capacity(entries.len());
    for (entry, path) in entries.iter().zip(found) {
        match path {
            Some(path) => installed.push(path),
            None if entry.required => {
                return Err(FetchError::MissingArchiveEntry {
                    archive: archive.to_path_buf(),
                    entry: entry.name.clone(),
                })
            }
            None => {
                info!(entry = %entry.name, archive = %archive.display(), "optional entry not in archive");
            }
        }
    }

    Ok(installed)
}

/// Last path component of an archive member name, if it is a file name.
fn member_file_name(name: &str) -> Option<&str> {
    let name = name.trim_end_matches(['/', '\\']);
    let file_name = name.rsplit(['/', '\\']).next()?;
    (!file_name.is_empty() && file_name != "." && file_name != "..").then_some(file_name)
}

fn extract_zip(
    archive_path: &Path,
    entries: &[ArchiveEntry],
    dest_dir: &Path,
) -> FetchResult<Vec<Option<PathBuf>>> {
    let file = File::open(archive_path).map_err(|e| FetchError::ReadFailed {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| FetchError::ExtractionFailed {
        path: archive_path.to_path_buf(),
        reason: format!("failed to read zip archive: {}", e),
    })?;

    let mut found: Vec<Option<PathBuf>> = vec![None; entries.len()];

    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| FetchError::ExtractionFailed {
                path: archive_path.to_path_buf(),
                reason: format!("zip read failed: {}", e),
            })?;
        if member.is_dir() {
            continue;
        }

        let Some(file_name) = member_file_name(member.name()).map(str::to_string) else {
            continue;
        };
        let Some(slot) = entries
            .iter()
            .position(|entry| entry.name == file_name)
            .filter(|&idx| found[idx].is_none())
        else {
            continue;
        };

        let out_path = dest_dir.join(&file_name);
        let staging = staging_path_for(&out_path);
        let mut out_file = File::create(&staging).map_err(|e| FetchError::WriteFailed {
            path: staging.clone(),
            source: e,
        })?;
        io::copy(&mut member, &mut out_file).map_err(|e| FetchError::ExtractionFailed {
            path: archive_path.to_path_buf(),
            reason: format!("failed to unpack {}: {}", member.name(), e),
        })?;
        drop(out_file);
        publish_staged(&staging, &out_path)?;

        debug!(entry = %file_name, path = %out_path.display(), "extracted");
        found[slot] = Some(out_path);
    }

    Ok(found)
}

fn extract_tar(
    archive_path: &Path,
    format: ArchiveFormat,
    entries: &[ArchiveEntry],
    dest_dir: &Path,
) -> FetchResult<Vec<Option<PathBuf>>> {
    let archive_name = archive_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy();
    let scratch = dest_dir.join(format!(".{}.extract", archive_name));

    if scratch.exists() {
        fs::remove_dir_all(&scratch).map_err(|e| FetchError::WriteFailed {
            path: scratch.clone(),
            source: e,
        })?;
    }
    fs::create_dir_all(&scratch).map_err(|e| FetchError::CreateDirFailed {
        path: scratch.clone(),
        source: e,
    })?;

    let result = unpack_tar(archive_path, format, &scratch)
        .and_then(|()| collect_from_scratch(&scratch, entries, dest_dir));

    if let Err(e) = fs::remove_dir_all(&scratch) {
        warn!(path = %scratch.display(), error = %e, "failed to remove extraction scratch directory");
    }

    result
}

fn unpack_tar(archive: &Path, format: ArchiveFormat, dest_dir: &Path) -> FetchResult<()> {
    let flags = match format {
        ArchiveFormat::TarXz => "-xJf",
        _ => "-xzf",
    };

    let output = Command::new("tar")
        .arg(flags)
        .arg(archive)
        .arg("-C")
        .arg(dest_dir)
        .output()
        .map_err(|e| FetchError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason: format!("Failed to run tar: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason: format!("tar extraction failed: {}", stderr.trim()),
        });
    }

    Ok(())
}

fn collect_from_scratch(
    scratch: &Path,
    entries: &[ArchiveEntry],
    dest_dir: &Path,
) -> FetchResult<Vec<Option<PathBuf>>> {
    let mut found = Vec::with_capacity(entries.len());
    for entry in entries {
        let located = find_file_named(scratch, &entry.name)?;
        let placed = match located {
            Some(source) => {
                let out_path = dest_dir.join(&entry.name);
                publish_staged(&source, &out_path)?;
                debug!(entry = %entry.name, path = %out_path.display(), "extracted");
                Some(out_path)
            }
            None => None,
        };
        found.push(placed);
    }
    Ok(found)
}

/// Depth-first search for a regular file called `name` under `dir`.
fn find_file_named(dir: &Path, name: &str) -> FetchResult<Option<PathBuf>> {
    let read_dir = fs::read_dir(dir).map_err(|e| FetchError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut subdirs = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push(path);
        } else if file_type.is_file() && entry.file_name() == name {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_file_named(&subdir, name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

/// Check if required tools are available.
pub fn check_required_tools() -> FetchResult<()> {
    let tar_check = Command::new("tar").arg("--version").output();

    if tar_check.is_err() {
        return Err(FetchError::ExtractionFailed {
            path: PathBuf::new(),
            reason: "tar command not found. Please install tar.".to_string(),
        });
    }

    Ok(())
}
