//! Descriptions of installable artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{ArtifactOverrides, FetchConfig};
use crate::error::FetchError;
use crate::extractor::{ArchiveEntry, ArchiveFormat};
use crate::platform::Platform;

const KIB: u64 = 1024;

/// The binaries this crate knows how to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    YtDlp,
    Ffmpeg,
}

impl ArtifactId {
    pub const ALL: [ArtifactId; 2] = [ArtifactId::YtDlp, ArtifactId::Ffmpeg];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::Ffmpeg => "ffmpeg",
        }
    }

    /// Build the artifact description from configuration.
    pub fn artifact(self, config: &FetchConfig) -> Artifact {
        match self {
            Self::YtDlp => Artifact::yt_dlp(config.platform, &config.yt_dlp),
            Self::Ffmpeg => Artifact::ffmpeg(config.platform, &config.ffmpeg),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yt-dlp" | "ytdlp" | "yt_dlp" => Ok(Self::YtDlp),
            "ffmpeg" => Ok(Self::Ffmpeg),
            other => Err(FetchError::InvalidConfig(format!(
                "unknown artifact '{}' (expected yt-dlp or ffmpeg)",
                other
            ))),
        }
    }
}

/// Where an artifact's expected digest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumSource {
    /// No published digest; installed without verification.
    None,
    /// Digest given directly.
    Inline(String),
    /// Digest listed for `file_name` in the manifest at `url`.
    Manifest { url: String, file_name: String },
}

/// What the downloaded file is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The download is the executable itself.
    SingleFile { file_name: String },
    /// The download is a bundle; `entries` are pulled out of it and the
    /// bundle, saved as `archive_name`, is removed afterwards.
    Archive {
        archive_name: String,
        format: ArchiveFormat,
        entries: Vec<ArchiveEntry>,
    },
}

/// One installable binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Short identifier, e.g. `yt-dlp`.
    pub name: String,
    /// Label used in status phrases, e.g. `FFmpeg`.
    pub label: String,
    pub url: String,
    pub checksum: ChecksumSource,
    pub kind: ArtifactKind,
    /// Preferred transfer window size.
    pub window_size: Option<u64>,
}

impl Artifact {
    /// A download that is installed as-is.
    pub fn single_file(
        name: impl Into<String>,
        url: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            url: url.into(),
            checksum: ChecksumSource::None,
            kind: ArtifactKind::SingleFile {
                file_name: file_name.into(),
            },
            window_size: None,
        }
    }

    /// A bundle from which `entries` are extracted.
    pub fn archive(
        name: impl Into<String>,
        url: impl Into<String>,
        format: ArchiveFormat,
        entries: Vec<ArchiveEntry>,
    ) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            kind: ArtifactKind::Archive {
                archive_name: format!("{}.{}", name, format.extension()),
                format,
                entries,
            },
            name,
            url: url.into(),
            checksum: ChecksumSource::None,
            window_size: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumSource) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_window_size(mut self, window_size: u64) -> Self {
        self.window_size = Some(window_size);
        self
    }

    /// yt-dlp for `platform`, with optional source overrides.
    ///
    /// The release default is checked against the release's `SHA2-256SUMS`.
    pub fn yt_dlp(platform: Platform, overrides: &ArtifactOverrides) -> Self {
        let url = overrides
            .url
            .clone()
            .unwrap_or_else(|| platform.yt_dlp_url());
        let default_manifest = overrides
            .url
            .is_none()
            .then(|| platform.yt_dlp_manifest_url());
        let checksum = checksum_source(overrides, &url, default_manifest);

        Self::single_file("yt-dlp", url, platform.executable_name("yt-dlp"))
            .with_checksum(checksum)
            .with_window_size(512 * KIB)
    }

    /// ffmpeg (plus ffprobe when the bundle has it) for `platform`.
    pub fn ffmpeg(platform: Platform, overrides: &ArtifactOverrides) -> Self {
        let (default_url, default_format) = platform.ffmpeg_bundle();
        let url = overrides.url.clone().unwrap_or(default_url);
        let format = overrides
            .format
            .or_else(|| ArchiveFormat::from_name(url_file_name(&url)))
            .unwrap_or(default_format);
        let checksum = checksum_source(overrides, &url, None);

        let entries = vec![
            ArchiveEntry::required(platform.executable_name("ffmpeg")),
            ArchiveEntry::optional(platform.executable_name("ffprobe")),
        ];

        Self::archive("ffmpeg", url, format, entries)
            .with_label("FFmpeg")
            .with_checksum(checksum)
            .with_window_size(1024 * KIB)
    }

    /// Where the download itself is written.
    pub fn download_path(&self, install_dir: &Path) -> PathBuf {
        match &self.kind {
            ArtifactKind::SingleFile { file_name } => install_dir.join(file_name),
            ArtifactKind::Archive { archive_name, .. } => install_dir.join(archive_name),
        }
    }

    /// Files that must exist for the artifact to count as installed.
    pub fn required_paths(&self, install_dir: &Path) -> Vec<PathBuf> {
        match &self.kind {
            ArtifactKind::SingleFile { file_name } => vec![install_dir.join(file_name)],
            ArtifactKind::Archive { entries, .. } => entries
                .iter()
                .filter(|entry| entry.required)
                .map(|entry| install_dir.join(&entry.name))
                .collect(),
        }
    }

    /// Whether the download is a bundle.
    pub fn is_archive(&self) -> bool {
        matches!(self.kind, ArtifactKind::Archive { .. })
    }
}

/// Last path segment of a URL, ignoring any query or fragment.
pub fn url_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn checksum_source(
    overrides: &ArtifactOverrides,
    url: &str,
    default_manifest: Option<String>,
) -> ChecksumSource {
    if let Some(digest) = &overrides.sha256 {
        return ChecksumSource::Inline(digest.clone());
    }
    match overrides.sha256_manifest.clone().or(default_manifest) {
        Some(manifest_url) => ChecksumSource::Manifest {
            url: manifest_url,
            file_name: url_file_name(url).to_string(),
        },
        None => ChecksumSource::None,
    }
}
