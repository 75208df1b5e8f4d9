//! `binsetup install`: download and install binaries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use binsetup::extractor::check_required_tools;
use binsetup::{
    ArchiveFormat, Artifact, ArtifactInstaller, ArtifactKind, FetchResult, InstallOutcome,
    InstallProgressCallback, InstallStage, InstallUpdate, TransferControl,
};
use clap::Args;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::info;

use super::{resolve_config, CommonArgs, Target};
use crate::error::CliError;

/// Arguments for `binsetup install`.
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// What to install
    #[arg(value_enum, default_value_t = Target::All)]
    pub target: Target,

    /// Download again even if already installed
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run the install command.
pub fn run(args: InstallArgs) -> Result<(), CliError> {
    let config = resolve_config(&args.common)?;
    let install_dir = config.install_dir.clone();
    let installer = ArtifactInstaller::from_config(config)?;

    let artifacts: Vec<Artifact> = args
        .target
        .artifact_ids()
        .into_iter()
        .map(|id| installer.artifact(id))
        .collect();

    if artifacts.iter().any(needs_tar) {
        check_required_tools()?;
    }

    let control = TransferControl::new();
    install_interrupt_handler(control.clone())?;

    println!("Installing into {}", install_dir.display());
    println!("Press Ctrl+C to pause (resumable downloads), twice to abort");
    println!();

    let bars = ProgressBars::new(&artifacts);
    let callback = bars.callback();
    let results = installer.install_all(&artifacts, args.force, &control, Some(&callback));

    println!();
    summarize(results)
}

/// Whether extracting this artifact needs the system `tar`.
fn needs_tar(artifact: &Artifact) -> bool {
    matches!(
        artifact.kind,
        ArtifactKind::Archive {
            format: ArchiveFormat::TarGz | ArchiveFormat::TarXz,
            ..
        }
    )
}

/// First Ctrl+C pauses at the next window boundary, the second aborts.
fn install_interrupt_handler(control: TransferControl) -> Result<(), CliError> {
    let presses = AtomicUsize::new(0);

    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!();
            eprintln!("Pausing after the current chunk... (Ctrl+C again to abort)");
            control.request_pause();
        } else {
            eprintln!();
            eprintln!("Aborting...");
            control.abort();
        }
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// One progress bar per artifact.
struct ProgressBars {
    // Keeps the bars drawn together.
    _multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl ProgressBars {
    fn new(artifacts: &[Artifact]) -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template(
            "{prefix:>8} [{bar:30.cyan/blue}] {pos:>3}% {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

        let bars = artifacts
            .iter()
            .map(|artifact| {
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(artifact.name.clone());
                bar.set_message("waiting");
                (artifact.name.clone(), bar)
            })
            .collect();

        Self {
            _multi: multi,
            bars,
        }
    }

    fn callback(&self) -> InstallProgressCallback {
        let bars = self.bars.clone();
        Box::new(move |update: &InstallUpdate| {
            if let Some(bar) = bars.get(&update.artifact) {
                apply_update(bar, update);
            }
        })
    }
}

fn apply_update(bar: &ProgressBar, update: &InstallUpdate) {
    match update.stage {
        InstallStage::Transferring => {
            bar.set_position(update.percent.round() as u64);
            bar.set_message(progress_message(update));
        }
        InstallStage::Done => {
            bar.set_position(100);
            bar.finish_with_message(update.status.clone());
        }
        InstallStage::Paused => bar.abandon_with_message(update.status.clone()),
        InstallStage::Failed => bar.abandon_with_message(format!("failed: {}", update.status)),
        _ => bar.set_message(update.status.clone()),
    }
}

/// Bar message while downloading, e.g.
/// `Downloading yt-dlp... 1.5 / 10.0 MB | 2.0 MB/s | ETA 5s`.
fn progress_message(update: &InstallUpdate) -> String {
    let mut message = update.status.clone();
    if let Some(speed) = &update.speed_label {
        message.push_str(" | ");
        message.push_str(speed);
    }
    if let Some(eta) = &update.eta_label {
        message.push_str(" | ETA ");
        message.push_str(eta);
    }
    if !update.can_pause {
        message.push_str(" (not pausable)");
    }
    message
}

/// One summary line for an artifact's result.
fn describe_outcome(name: &str, result: &FetchResult<InstallOutcome>) -> String {
    match result {
        Ok(outcome) if outcome.already_installed => format!("{}: already installed", name),
        Ok(outcome) if outcome.completed => {
            let files: Vec<String> = outcome
                .installed
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            format!("{}: installed {}", name, files.join(", "))
        }
        Ok(_) => format!("{}: paused, run the command again to resume", name),
        Err(e) => format!("{}: {}", name, e),
    }
}

fn summarize(results: Vec<(String, FetchResult<InstallOutcome>)>) -> Result<(), CliError> {
    let total = results.len();
    let mut failures = Vec::new();

    for (name, result) in results {
        println!("{}", describe_outcome(&name, &result));
        match result {
            Ok(outcome) if !outcome.completed => info!(artifact = %name, "install paused"),
            Ok(_) => {}
            Err(e) => failures.push(e),
        }
    }

    match failures.len() {
        0 => Ok(()),
        1 if total == 1 => Err(CliError::Fetch(failures.remove(0))),
        failed => Err(CliError::Batch { failed, total }),
    }
}
