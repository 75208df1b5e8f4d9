//! Configuration for binary installs.
//!
//! [`FetchConfig`] is the in-memory configuration handed to the installer.
//! [`ConfigFile`] reads the optional INI file that overrides its defaults:
//!
//! ```ini
//! [general]
//! install_dir = /opt/binsetup
//! platform = linux
//! timeout_secs = 120
//! window_size = 1048576
//!
//! [yt-dlp]
//! url = https://mirror.example.com/yt-dlp_linux
//! sha256_manifest = https://mirror.example.com/SHA2-256SUMS
//!
//! [ffmpeg]
//! url = https://mirror.example.com/ffmpeg.tar.xz
//! sha256 = 9f86d081884c7d65...
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{Ini, Properties};
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::extractor::ArchiveFormat;
use crate::platform::Platform;
use crate::transfer::DEFAULT_TIMEOUT_SECS;

/// Application directory name under the platform data/config dirs.
pub const APP_DIR_NAME: &str = "binsetup";

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Section names for per-artifact overrides.
pub const YT_DLP_SECTION: &str = "yt-dlp";
pub const FFMPEG_SECTION: &str = "ffmpeg";

/// Largest accepted `[general] window_size` (256 MiB).
pub const MAX_WINDOW_SIZE: u64 = 256 * 1024 * 1024;

/// Default install directory: `<data dir>/binsetup/binaries`.
pub fn default_install_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join("binaries")
}

/// Default config file location: `<config dir>/binsetup/config.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Default `User-Agent` header.
pub fn default_user_agent() -> String {
    format!("{}/{}", APP_DIR_NAME, env!("CARGO_PKG_VERSION"))
}

/// Per-artifact source overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactOverrides {
    /// Download URL replacing the release default.
    pub url: Option<String>,
    /// Expected SHA-256 digest.
    pub sha256: Option<String>,
    /// URL of a checksum manifest to look the digest up in.
    pub sha256_manifest: Option<String>,
    /// Bundle format, for archive artifacts whose URL does not reveal it.
    pub format: Option<ArchiveFormat>,
}

impl ArtifactOverrides {
    fn from_section(section: &str, props: &Properties) -> FetchResult<Self> {
        let value = |key: &str| {
            props
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let sha256 = value("sha256");
        if let Some(digest) = &sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(FetchError::InvalidConfig(format!(
                    "[{}] sha256 must be 64 hex characters",
                    section
                )));
            }
        }

        Ok(Self {
            url: value("url"),
            sha256,
            sha256_manifest: value("sha256_manifest"),
            format: value("format").map(|f| ArchiveFormat::parse(&f)).transpose()?,
        })
    }

    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Configuration for the installer.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Directory where binaries are installed.
    pub install_dir: PathBuf,

    /// Platform whose release assets are fetched.
    pub platform: Platform,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// `User-Agent` sent with every request.
    pub user_agent: String,

    /// Fixed transfer window size; `None` picks one from the artifact size.
    pub window_size: Option<u64>,

    /// yt-dlp source overrides.
    pub yt_dlp: ArtifactOverrides,

    /// ffmpeg source overrides.
    pub ffmpeg: ArtifactOverrides,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            platform: Platform::detect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            window_size: None,
            yt_dlp: ArtifactOverrides::default(),
            ffmpeg: ArtifactOverrides::default(),
        }
    }
}

impl FetchConfig {
    /// Create a new configuration with the given install directory.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            ..Default::default()
        }
    }

    /// Set the install directory.
    pub fn with_install_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_dir = path.into();
        self
    }

    /// Set the target platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Use a fixed transfer window size.
    pub fn with_window_size(mut self, window_size: u64) -> Self {
        self.window_size = Some(window_size);
        self
    }

    /// Override where yt-dlp comes from.
    pub fn with_yt_dlp(mut self, overrides: ArtifactOverrides) -> Self {
        self.yt_dlp = overrides;
        self
    }

    /// Override where ffmpeg comes from.
    pub fn with_ffmpeg(mut self, overrides: ArtifactOverrides) -> Self {
        self.ffmpeg = overrides;
        self
    }
}

/// Values read from an INI config file. Unset keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub install_dir: Option<PathBuf>,
    pub platform: Option<Platform>,
    pub timeout_secs: Option<u64>,
    pub window_size: Option<u64>,
    pub yt_dlp: ArtifactOverrides,
    pub ffmpeg: ArtifactOverrides,
}

impl ConfigFile {
    /// Load a config file. A missing file yields an empty config.
    pub fn load(path: &Path) -> FetchResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(FetchError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let config = Self::parse(&text).map_err(|e| match e {
            FetchError::InvalidConfig(msg) => {
                FetchError::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Load from the default location, if there is one.
    pub fn load_default() -> FetchResult<Self> {
        match default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> FetchResult<Self> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| FetchError::InvalidConfig(format!("malformed INI: {}", e)))?;

        let mut config = Self::default();

        if let Some(general) = ini.section(Some("general")) {
            config.install_dir = general
                .get("install_dir")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(expand_tilde);
            config.platform = general
                .get("platform")
                .map(str::parse::<Platform>)
                .transpose()?;
            config.timeout_secs = parse_u64(general, "timeout_secs")?;
            config.window_size = parse_u64(general, "window_size")?;

            if config.timeout_secs == Some(0) {
                return Err(FetchError::InvalidConfig(
                    "[general] timeout_secs must be greater than zero".to_string(),
                ));
            }
            if config.window_size == Some(0) {
                return Err(FetchError::InvalidConfig(
                    "[general] window_size must be greater than zero".to_string(),
                ));
            }
            if let Some(size) = config.window_size.filter(|&s| s > MAX_WINDOW_SIZE) {
                return Err(FetchError::InvalidConfig(format!(
                    "[general] window_size {} exceeds the maximum of {} bytes",
                    size, MAX_WINDOW_SIZE
                )));
            }
        }

        if let Some(section) = ini.section(Some(YT_DLP_SECTION)) {
            config.yt_dlp = ArtifactOverrides::from_section(YT_DLP_SECTION, section)?;
        }
        if let Some(section) = ini.section(Some(FFMPEG_SECTION)) {
            config.ffmpeg = ArtifactOverrides::from_section(FFMPEG_SECTION, section)?;
        }

        Ok(config)
    }

    /// Overlay these values on `base`.
    pub fn apply(self, mut base: FetchConfig) -> FetchConfig {
        if let Some(dir) = self.install_dir {
            base.install_dir = dir;
        }
        if let Some(platform) = self.platform {
            base.platform = platform;
        }
        if let Some(secs) = self.timeout_secs {
            base.timeout = Duration::from_secs(secs);
        }
        if let Some(size) = self.window_size {
            base.window_size = Some(size);
        }
        if !self.yt_dlp.is_empty() {
            base.yt_dlp = self.yt_dlp;
        }
        if !self.ffmpeg.is_empty() {
            base.ffmpeg = self.ffmpeg;
        }
        base
    }
}

fn parse_u64(props: &Properties, key: &str) -> FetchResult<Option<u64>> {
    props
        .get(key)
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| {
                FetchError::InvalidConfig(format!("[general] {} must be a whole number", key))
            })
        })
        .transpose()
}

fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.install_dir.ends_with("binsetup/binaries"));
        assert!(config.user_agent.starts_with("binsetup/"));
        assert_eq!(config.window_size, None);
        assert_eq!(config.platform, Platform::detect());
    }

    #[test]
    fn test_builder_pattern() {
        let config = FetchConfig::new("/opt/bin")
            .with_platform(Platform::Windows)
            .with_timeout(Duration::from_secs(60))
            .with_window_size(4096)
            .with_user_agent("test-agent")
            .with_yt_dlp(ArtifactOverrides {
                url: Some("http://mirror/yt-dlp".to_string()),
                ..Default::default()
            });

        assert_eq!(config.install_dir, PathBuf::from("/opt/bin"));
        assert_eq!(config.platform, Platform::Windows);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.window_size, Some(4096));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.yt_dlp.url.as_deref(), Some("http://mirror/yt-dlp"));
    }

    #[test]
    fn test_parse_full_file() {
        let text = format!(
            "[general]\n\
             install_dir = /srv/bins\n\
             platform = macos\n\
             timeout_secs = 45\n\
             window_size = 1048576\n\
             \n\
             [yt-dlp]\n\
             sha256_manifest = http://mirror/SHA2-256SUMS\n\
             \n\
             [ffmpeg]\n\
             url = http://mirror/ffmpeg-bundle\n\
             sha256 = {}\n\
             format = tar.xz\n",
            DIGEST
        );

        let file = ConfigFile::parse(&text).unwrap();

        assert_eq!(file.install_dir, Some(PathBuf::from("/srv/bins")));
        assert_eq!(file.platform, Some(Platform::MacOs));
        assert_eq!(file.timeout_secs, Some(45));
        assert_eq!(file.window_size, Some(1_048_576));
        assert_eq!(
            file.yt_dlp.sha256_manifest.as_deref(),
            Some("http://mirror/SHA2-256SUMS")
        );
        assert_eq!(file.ffmpeg.url.as_deref(), Some("http://mirror/ffmpeg-bundle"));
        assert_eq!(file.ffmpeg.sha256.as_deref(), Some(DIGEST));
        assert_eq!(file.ffmpeg.format, Some(ArchiveFormat::TarXz));
    }

    #[test]
    fn test_apply_overlays_only_set_values() {
        let file = ConfigFile {
            timeout_secs: Some(10),
            ..Default::default()
        };
        let base = FetchConfig::new("/keep/me").with_platform(Platform::Linux);

        let merged = file.apply(base);

        assert_eq!(merged.install_dir, PathBuf::from("/keep/me"));
        assert_eq!(merged.platform, Platform::Linux);
        assert_eq!(merged.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ConfigFile::parse("[general]\ntimeout_secs = soon\n"),
            Err(FetchError::InvalidConfig(_))
        ));
        assert!(matches!(
            ConfigFile::parse("[general]\nwindow_size = 0\n"),
            Err(FetchError::InvalidConfig(_))
        ));
        assert!(matches!(
            ConfigFile::parse("[general]\nplatform = plan9\n"),
            Err(FetchError::InvalidConfig(_))
        ));
        assert!(matches!(
            ConfigFile::parse("[ffmpeg]\nsha256 = abc\n"),
            Err(FetchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_window_size_is_capped() {
        assert!(matches!(
            ConfigFile::parse("[general]\nwindow_size = 18446744073709551615\n"),
            Err(FetchError::InvalidConfig(_))
        ));
        assert!(matches!(
            ConfigFile::parse("[general]\nwindow_size = 268435457\n"),
            Err(FetchError::InvalidConfig(_))
        ));

        let file = ConfigFile::parse("[general]\nwindow_size = 268435456\n").unwrap();
        assert_eq!(file.window_size, Some(MAX_WINDOW_SIZE));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let file = ConfigFile::load(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn test_load_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[general]\ntimeout_secs = 12\n").unwrap();

        let file = ConfigFile::load(&path).unwrap();

        assert_eq!(file.timeout_secs, Some(12));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/bins"), home.join("bins"));
        }
    }
}
