//! Target platforms and their release asset naming.
//!
//! Everything platform-specific is a lookup on [`Platform`]; nothing here
//! inspects the running OS except [`Platform::detect`].

use std::fmt;

use crate::error::FetchError;
use crate::extractor::ArchiveFormat;

/// Base URL for the latest yt-dlp release assets.
pub const YT_DLP_RELEASE_BASE: &str = "https://github.com/yt-dlp/yt-dlp/releases/latest/download";

/// Checksum manifest published alongside every yt-dlp release.
pub const YT_DLP_CHECKSUM_MANIFEST: &str = "SHA2-256SUMS";

const FFMPEG_BTBN_BASE: &str = "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest";
const FFMPEG_MACOS_URL: &str = "https://evermeet.cx/ffmpeg/getrelease/zip";

/// Operating system a binary is installed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Platform of the running binary. Anything that is not Windows or macOS
    /// is treated as Linux.
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// File name of an executable called `stem` on this platform.
    pub fn executable_name(self, stem: &str) -> String {
        match self {
            Self::Windows => format!("{}.exe", stem),
            Self::MacOs | Self::Linux => stem.to_string(),
        }
    }

    /// Whether installed executables need their mode bits set.
    pub fn needs_exec_bit(self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// yt-dlp release asset name.
    pub fn yt_dlp_asset(self) -> &'static str {
        match self {
            Self::Windows => "yt-dlp.exe",
            Self::MacOs => "yt-dlp_macos",
            Self::Linux => "yt-dlp_linux",
        }
    }

    /// Default download URL for yt-dlp.
    pub fn yt_dlp_url(self) -> String {
        format!("{}/{}", YT_DLP_RELEASE_BASE, self.yt_dlp_asset())
    }

    /// Default checksum manifest URL for yt-dlp.
    pub fn yt_dlp_manifest_url(self) -> String {
        format!("{}/{}", YT_DLP_RELEASE_BASE, YT_DLP_CHECKSUM_MANIFEST)
    }

    /// Default ffmpeg bundle URL and its archive format.
    pub fn ffmpeg_bundle(self) -> (String, ArchiveFormat) {
        match self {
            Self::Windows => (
                format!("{}/ffmpeg-master-latest-win64-gpl.zip", FFMPEG_BTBN_BASE),
                ArchiveFormat::Zip,
            ),
            Self::MacOs => (FFMPEG_MACOS_URL.to_string(), ArchiveFormat::Zip),
            Self::Linux => (
                format!("{}/ffmpeg-master-latest-linux64-gpl.tar.xz", FFMPEG_BTBN_BASE),
                ArchiveFormat::TarXz,
            ),
        }
    }

    /// Identifier used in config files and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win" | "win64" => Ok(Self::Windows),
            "macos" | "mac" | "darwin" | "osx" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(FetchError::InvalidConfig(format!(
                "unknown platform '{}' (expected windows, macos or linux)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_names() {
        assert_eq!(Platform::Windows.executable_name("ffmpeg"), "ffmpeg.exe");
        assert_eq!(Platform::MacOs.executable_name("ffmpeg"), "ffmpeg");
        assert_eq!(Platform::Linux.executable_name("ffprobe"), "ffprobe");
    }

    #[test]
    fn test_yt_dlp_assets() {
        assert_eq!(Platform::Windows.yt_dlp_asset(), "yt-dlp.exe");
        assert_eq!(Platform::MacOs.yt_dlp_asset(), "yt-dlp_macos");
        assert_eq!(
            Platform::Linux.yt_dlp_url(),
            "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_linux"
        );
        assert!(Platform::Linux
            .yt_dlp_manifest_url()
            .ends_with("/SHA2-256SUMS"));
    }

    #[test]
    fn test_ffmpeg_bundles() {
        let (url, format) = Platform::Windows.ffmpeg_bundle();
        assert!(url.ends_with("win64-gpl.zip"));
        assert_eq!(format, ArchiveFormat::Zip);

        let (url, format) = Platform::Linux.ffmpeg_bundle();
        assert!(url.ends_with("linux64-gpl.tar.xz"));
        assert_eq!(format, ArchiveFormat::TarXz);

        assert_eq!(Platform::MacOs.ffmpeg_bundle().1, ArchiveFormat::Zip);
    }

    #[test]
    fn test_parse_platform() {
        assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("darwin".parse::<Platform>().unwrap(), Platform::MacOs);
        assert_eq!(" linux ".parse::<Platform>().unwrap(), Platform::Linux);
        assert!(matches!(
            "beos".parse::<Platform>(),
            Err(FetchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_display_round_trips_identifier() {
        for platform in [Platform::Windows, Platform::MacOs, Platform::Linux] {
            assert_eq!(platform.to_string().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_exec_bit() {
        assert!(!Platform::Windows.needs_exec_bit());
        assert!(Platform::Linux.needs_exec_bit());
    }
}
