//! `binsetup status`: report installed binaries without touching the network.

use std::fs;
use std::path::Path;

use binsetup::transfer::staging_path_for;
use binsetup::{Artifact, ArtifactKind, FetchConfig};
use clap::Args;

use super::{resolve_config, CommonArgs, Target};
use crate::error::CliError;

/// Arguments for `binsetup status`.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// What to report on
    #[arg(value_enum, default_value_t = Target::All)]
    pub target: Target,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Local state of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    /// Every required file is present.
    Installed,
    /// A resumable download of this many bytes is waiting.
    Partial(u64),
    Missing,
}

/// Run the status command.
pub fn run(args: StatusArgs) -> Result<(), CliError> {
    let config = resolve_config(&args.common)?;

    println!("Install directory: {}", config.install_dir.display());
    println!("Platform:          {}", config.platform);
    println!();

    for id in args.target.artifact_ids() {
        let artifact = id.artifact(&config);
        let state = artifact_state(&artifact, &config);
        println!("{:<8} {}", artifact.name, describe_state(&state));
        println!("         source: {}", artifact.url);
    }

    Ok(())
}

/// Inspect the install directory for `artifact`.
pub fn artifact_state(artifact: &Artifact, config: &FetchConfig) -> ArtifactState {
    let install_dir = &config.install_dir;
    let staging = staging_path_for(&artifact.download_path(install_dir));
    let staged = file_len(&staging);

    let complete = artifact
        .required_paths(install_dir)
        .iter()
        .all(|path| path.is_file());

    match (&artifact.kind, complete, staged) {
        // A single file with a staging file beside it is mid-update.
        (ArtifactKind::SingleFile { .. }, true, Some(bytes)) => ArtifactState::Partial(bytes),
        (_, true, _) => ArtifactState::Installed,
        (_, false, Some(bytes)) => ArtifactState::Partial(bytes),
        (_, false, None) => ArtifactState::Missing,
    }
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

fn describe_state(state: &ArtifactState) -> String {
    match state {
        ArtifactState::Installed => "installed".to_string(),
        ArtifactState::Partial(bytes) => format!(
            "partial download ({} MB), run `binsetup install` to resume",
            binsetup::format::format_mb(*bytes)
        ),
        ArtifactState::Missing => "not installed".to_string(),
    }
}
