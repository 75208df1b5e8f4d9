//! Artifact installer: download, verify, extract and finalize binaries.
//!
//! This module orchestrates the full installation workflow for one artifact:
//! 1. Ensure the install directory exists
//! 2. Skip the work if the artifact is already installed
//! 3. Resolve the expected checksum (inline or from a manifest)
//! 4. Probe the server and pick the chunked or streaming transfer
//! 5. Verify the download, deleting it on mismatch
//! 6. Extract bundle entries and remove the bundle
//! 7. Set executable permissions
//!
//! A paused transfer ends the run early with `completed: false`; calling
//! [`ArtifactInstaller::install`] again resumes from the staging file.

mod artifact;

pub use artifact::{url_file_name, Artifact, ArtifactId, ArtifactKind, ChecksumSource};

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::extractor::extract_entries;
use crate::format::{download_status, format_eta, format_speed, progress_percent};
use crate::transfer::{
    default_window_size, probe, ChunkedTransfer, HttpSource, ReqwestSource, StreamTransfer,
    TransferControl, TransferProgress, TransferTarget,
};
use crate::verify::{verify_checksum, verify_or_discard, ChecksumManifest};

/// Upper bound on the size of a checksum manifest.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Progress callback for installation operations.
pub type InstallProgressCallback = Box<dyn Fn(&InstallUpdate) + Send + Sync>;

/// Installation stages for progress reporting.
///
/// ```text
/// Idle → Probing → Transferring → Verifying → Extracting → Finalizing → Done
///                       │              │            │
///                       ├─► Paused     └────────────┴─► Failed
///                       └─► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    /// Nothing has started.
    Idle,
    /// Discovering size and Range support.
    Probing,
    /// Downloading.
    Transferring,
    /// Stopped at a window boundary; resumable.
    Paused,
    /// Checking the SHA-256 digest.
    Verifying,
    /// Pulling entries out of a bundle.
    Extracting,
    /// Setting permissions and cleaning up.
    Finalizing,
    /// Installation complete.
    Done,
    /// Installation failed.
    Failed,
}

impl InstallStage {
    /// Get a human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Probing => "Probing",
            Self::Transferring => "Downloading",
            Self::Paused => "Paused",
            Self::Verifying => "Verifying",
            Self::Extracting => "Extracting",
            Self::Finalizing => "Finalizing",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Whether the run has ended in this stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paused | Self::Done | Self::Failed)
    }
}

/// A progress event for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallUpdate {
    /// Artifact name, e.g. `yt-dlp`.
    pub artifact: String,
    pub stage: InstallStage,
    /// Human-readable phrase, e.g. "Downloading yt-dlp... 1.5 / 10.0 MB".
    pub status: String,
    /// 0–100; a sawtooth over downloaded MiB when the size is unknown.
    pub percent: f64,
    /// e.g. "2.4 MB/s"; only set while transferring.
    pub speed_label: Option<String>,
    /// e.g. "1m 5s" or "Unknown"; only set while transferring.
    pub eta_label: Option<String>,
    /// Whether a pause request would be honoured right now.
    pub can_pause: bool,
}

/// Result of an artifact installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// False means paused; run again to resume.
    pub completed: bool,
    /// Stage the run ended in.
    pub stage: InstallStage,
    /// Files placed in the install directory.
    pub installed: Vec<PathBuf>,
    /// True when nothing was downloaded because the artifact was present.
    pub already_installed: bool,
}

/// Sends [`InstallUpdate`]s for one artifact.
struct Reporter<'a> {
    artifact: &'a str,
    label: &'a str,
    callback: Option<&'a InstallProgressCallback>,
}

impl Reporter<'_> {
    fn stage(&self, stage: InstallStage, status: impl Into<String>, percent: f64) {
        if let Some(cb) = self.callback {
            cb(&InstallUpdate {
                artifact: self.artifact.to_string(),
                stage,
                status: status.into(),
                percent,
                speed_label: None,
                eta_label: None,
                can_pause: false,
            });
        }
    }

    fn transfer(&self, progress: &TransferProgress) {
        if let Some(cb) = self.callback {
            cb(&InstallUpdate {
                artifact: self.artifact.to_string(),
                stage: InstallStage::Transferring,
                status: download_status(self.label, progress.loaded_bytes, progress.total_bytes),
                percent: progress_percent(progress.loaded_bytes, progress.total_bytes),
                speed_label: Some(format_speed(progress.speed_bps)),
                eta_label: Some(format_eta(progress.remaining_bytes(), progress.speed_bps)),
                can_pause: progress.resumable,
            });
        }
    }
}

/// Artifact installer.
///
/// Handles the complete installation workflow including probing,
/// downloading, verification, extraction and permission fix-up.
pub struct ArtifactInstaller<S: HttpSource> {
    source: S,
    config: FetchConfig,
}

impl ArtifactInstaller<ReqwestSource> {
    /// Create an installer that talks to the network.
    pub fn from_config(config: FetchConfig) -> FetchResult<Self> {
        let source = ReqwestSource::new(config.timeout, &config.user_agent)?;
        Ok(Self::new(source, config))
    }
}

impl<S: HttpSource> ArtifactInstaller<S> {
    /// Create an installer over an arbitrary request layer.
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// The artifact description for `id` under this installer's config.
    pub fn artifact(&self, id: ArtifactId) -> Artifact {
        id.artifact(&self.config)
    }

    /// Whether `artifact` is present and valid, without touching the network.
    ///
    /// A single file counts when it exists with no staging file beside it
    /// and, if an inline digest is configured, matches it. A bundle counts
    /// when every required entry exists.
    pub fn is_installed(&self, artifact: &Artifact) -> bool {
        let install_dir = &self.config.install_dir;
        let required = artifact.required_paths(install_dir);
        if !required.iter().all(|path| path.is_file()) {
            return false;
        }

        match &artifact.kind {
            ArtifactKind::Archive { .. } => true,
            ArtifactKind::SingleFile { .. } => {
                let target = TransferTarget::new(
                    artifact.url.clone(),
                    artifact.download_path(install_dir),
                );
                if target.staging_path().exists() {
                    return false;
                }
                match &artifact.checksum {
                    ChecksumSource::Inline(expected) => {
                        verify_checksum(target.destination_path(), expected).is_ok()
                    }
                    ChecksumSource::None | ChecksumSource::Manifest { .. } => true,
                }
            }
        }
    }

    /// Install one artifact.
    ///
    /// `force` re-downloads even when the artifact is already installed.
    /// Pause and abort requests arrive through `control`.
    pub fn install(
        &self,
        artifact: &Artifact,
        force: bool,
        control: &TransferControl,
        on_progress: Option<&InstallProgressCallback>,
    ) -> FetchResult<InstallOutcome> {
        let reporter = Reporter {
            artifact: &artifact.name,
            label: &artifact.label,
            callback: on_progress,
        };

        match self.run_install(artifact, force, control, &reporter) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "install failed");
                reporter.stage(InstallStage::Failed, e.to_string(), 0.0);
                Err(e)
            }
        }
    }

    /// Install several artifacts concurrently, one worker thread each.
    ///
    /// Results come back in the order of `artifacts`.
    pub fn install_all(
        &self,
        artifacts: &[Artifact],
        force: bool,
        control: &TransferControl,
        on_progress: Option<&InstallProgressCallback>,
    ) -> Vec<(String, FetchResult<InstallOutcome>)> {
        thread::scope(|scope| {
            let handles: Vec<_> = artifacts
                .iter()
                .map(|artifact| {
                    let handle =
                        scope.spawn(move || self.install(artifact, force, control, on_progress));
                    (artifact.name.clone(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                    (name, result)
                })
                .collect()
        })
    }

    fn run_install(
        &self,
        artifact: &Artifact,
        force: bool,
        control: &TransferControl,
        reporter: &Reporter<'_>,
    ) -> FetchResult<InstallOutcome> {
        let install_dir = &self.config.install_dir;
        reporter.stage(InstallStage::Idle, format!("Preparing {}...", artifact.label), 0.0);

        fs::create_dir_all(install_dir).map_err(|e| FetchError::CreateDirFailed {
            path: install_dir.clone(),
            source: e,
        })?;

        if !force && self.is_installed(artifact) {
            info!(artifact = %artifact.name, "already installed, skipping download");
            reporter.stage(
                InstallStage::Done,
                format!("{} is already installed", artifact.label),
                100.0,
            );
            return Ok(InstallOutcome {
                completed: true,
                stage: InstallStage::Done,
                installed: artifact.required_paths(install_dir),
                already_installed: true,
            });
        }

        let expected = self.resolve_checksum(artifact)?;

        // Probe
        reporter.stage(
            InstallStage::Probing,
            format!("Connecting to {} server...", artifact.label),
            0.0,
        );
        control.check_abort(&artifact.url)?;
        let probed = probe(&self.source, &artifact.url);

        // Transfer
        let download_path = artifact.download_path(install_dir);
        let target = TransferTarget::new(artifact.url.clone(), &download_path)
            .with_checksum(expected);
        let on_transfer = |progress: &TransferProgress| reporter.transfer(progress);

        let result = if probed.is_chunkable() {
            let window = self
                .config
                .window_size
                .or(artifact.window_size)
                .unwrap_or_else(|| default_window_size(probed.total_bytes));
            ChunkedTransfer::new(&self.source, window).run(
                &target,
                probed.total_bytes,
                control,
                &on_transfer,
            )?
        } else {
            debug!(artifact = %artifact.name, "server lacks range support, streaming");
            StreamTransfer::new(&self.source).run(
                &target,
                probed.total_bytes,
                control,
                &on_transfer,
            )?
        };

        if !result.completed {
            reporter.stage(
                InstallStage::Paused,
                format!("{} download paused", artifact.label),
                progress_percent(result.resume_offset, probed.total_bytes),
            );
            return Ok(InstallOutcome {
                completed: false,
                stage: InstallStage::Paused,
                installed: Vec::new(),
                already_installed: false,
            });
        }

        // Verify
        reporter.stage(InstallStage::Verifying, "Verifying Integrity...", 100.0);
        verify_or_discard(&download_path, target.expected_checksum())?;

        // Extract
        let installed = match &artifact.kind {
            ArtifactKind::SingleFile { .. } => vec![download_path],
            ArtifactKind::Archive {
                format, entries, ..
            } => {
                reporter.stage(
                    InstallStage::Extracting,
                    format!("Extracting {}...", artifact.label),
                    100.0,
                );
                let extracted = extract_entries(&download_path, *format, entries, install_dir);
                remove_transient(&download_path);
                extracted?
            }
        };

        // Finalize
        reporter.stage(InstallStage::Finalizing, "Finalizing...", 100.0);
        if self.config.platform.needs_exec_bit() {
            for path in &installed {
                mark_executable(path)?;
            }
        }

        info!(
            artifact = %artifact.name,
            files = installed.len(),
            "installation complete"
        );
        reporter.stage(
            InstallStage::Done,
            format!("{} ready", artifact.label),
            100.0,
        );

        Ok(InstallOutcome {
            completed: true,
            stage: InstallStage::Done,
            installed,
            already_installed: false,
        })
    }

    /// Expected digest for `artifact`, fetching its manifest if needed.
    fn resolve_checksum(&self, artifact: &Artifact) -> FetchResult<Option<String>> {
        match &artifact.checksum {
            ChecksumSource::None => Ok(None),
            ChecksumSource::Inline(digest) => Ok(Some(digest.trim().to_lowercase())),
            ChecksumSource::Manifest { url, file_name } => {
                let unavailable = |reason: String| FetchError::ChecksumUnavailable {
                    filename: file_name.clone(),
                    manifest_url: url.clone(),
                    reason,
                };

                let response = self.source.get(url).map_err(|e| unavailable(e.to_string()))?;
                if !(200..300).contains(&response.status) {
                    return Err(unavailable(format!("HTTP status {}", response.status)));
                }

                let mut text = String::new();
                response
                    .body
                    .take(MAX_MANIFEST_BYTES)
                    .read_to_string(&mut text)
                    .map_err(|e| unavailable(e.to_string()))?;

                let manifest = ChecksumManifest::parse(&text);
                let digest = manifest
                    .lookup(file_name)
                    .ok_or_else(|| unavailable("no entry in manifest".to_string()))?;
                debug!(artifact = %artifact.name, manifest = %url, "resolved checksum");
                Ok(Some(digest.to_string()))
            }
        }
    }
}

/// Remove a downloaded bundle once its entries have been extracted.
fn remove_transient(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove downloaded archive");
    }
}

/// Give an installed binary `rwxr-xr-x` permissions.
#[cfg(unix)]
fn mark_executable(path: &Path) -> FetchResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
        FetchError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> FetchResult<()> {
    Ok(())
}
