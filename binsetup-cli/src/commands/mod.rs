//! CLI subcommands.
//!
//! - `install`: download, verify and install binaries
//! - `status`: report what is installed, partial or missing

pub mod install;
pub mod status;

use std::path::PathBuf;

use binsetup::{ArtifactId, ConfigFile, FetchConfig, Platform};
use clap::{Args, ValueEnum};
use tracing::debug;

use crate::error::CliError;

/// Which binaries a command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// The yt-dlp executable
    #[value(name = "yt-dlp")]
    YtDlp,
    /// ffmpeg (and ffprobe when the bundle includes it)
    Ffmpeg,
    /// Everything
    All,
}

impl Target {
    pub fn artifact_ids(self) -> Vec<ArtifactId> {
        match self {
            Target::YtDlp => vec![ArtifactId::YtDlp],
            Target::Ffmpeg => vec![ArtifactId::Ffmpeg],
            Target::All => ArtifactId::ALL.to_vec(),
        }
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Directory to install binaries into
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fetch assets for another platform (windows, macos, linux)
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,
}

/// Build the effective configuration: defaults, then the config file, then
/// command-line overrides.
pub fn resolve_config(args: &CommonArgs) -> Result<FetchConfig, CliError> {
    let file = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            ConfigFile::load(path)?
        }
        None => ConfigFile::load_default()?,
    };

    let mut config = file.apply(FetchConfig::default());

    if let Some(dir) = &args.install_dir {
        config = config.with_install_dir(dir.clone());
    }
    if let Some(platform) = &args.platform {
        config = config.with_platform(platform.parse::<Platform>()?);
    }

    debug!(
        install_dir = %config.install_dir.display(),
        platform = %config.platform,
        timeout_secs = config.timeout.as_secs(),
        "resolved configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_target_artifacts() {
        assert_eq!(Target::YtDlp.artifact_ids(), vec![ArtifactId::YtDlp]);
        assert_eq!(
            Target::All.artifact_ids(),
            vec![ArtifactId::YtDlp, ArtifactId::Ffmpeg]
        );
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[general]\ninstall_dir = /from/file\nplatform = windows\ntimeout_secs = 30\n",
        )
        .unwrap();

        let args = CommonArgs {
            install_dir: Some(temp.path().join("cli")),
            config: Some(path),
            platform: Some("linux".to_string()),
        };
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.install_dir, temp.path().join("cli"));
        assert_eq!(config.platform, Platform::Linux);
        assert_eq!(config.timeout.as_secs(), 30);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let args = CommonArgs {
            config: Some(temp.path().join("nope.ini")),
            ..Default::default()
        };
        assert!(matches!(resolve_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn test_bad_platform_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.ini");
        fs::write(&path, "").unwrap();
        let args = CommonArgs {
            config: Some(path),
            platform: Some("amiga".to_string()),
            ..Default::default()
        };
        assert!(matches!(resolve_config(&args), Err(CliError::Fetch(_))));
    }
}
