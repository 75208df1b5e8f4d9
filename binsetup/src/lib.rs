//! binsetup - Resumable provisioning of yt-dlp and ffmpeg binaries
//!
//! This library downloads media tool binaries over HTTP with pause/resume
//! support, verifies them against published SHA-256 digests, unpacks
//! bundled releases and installs the executables into a local directory.
//!
//! ```no_run
//! use binsetup::{ArtifactId, ArtifactInstaller, FetchConfig, TransferControl};
//!
//! let config = FetchConfig::default();
//! let installer = ArtifactInstaller::from_config(config)?;
//! let artifact = installer.artifact(ArtifactId::YtDlp);
//! let outcome = installer.install(&artifact, false, &TransferControl::new(), None)?;
//! assert!(outcome.completed);
//! # Ok::<(), binsetup::FetchError>(())
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod format;
pub mod installer;
pub mod platform;
pub mod transfer;
pub mod verify;

pub use config::{ArtifactOverrides, ConfigFile, FetchConfig};
pub use error::{ErrorKind, FetchError, FetchResult};
pub use extractor::{ArchiveEntry, ArchiveFormat};
pub use installer::{
    Artifact, ArtifactId, ArtifactInstaller, ArtifactKind, ChecksumSource, InstallOutcome,
    InstallProgressCallback, InstallStage, InstallUpdate,
};
pub use platform::Platform;
pub use transfer::{
    HttpSource, ProbeResult, ReqwestSource, TransferControl, TransferProgress, TransferResult,
    TransferTarget,
};
