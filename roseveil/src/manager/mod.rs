//! Patch management.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        PatchInstaller                          │
//! │  install():  manifest → precondition → download → checksum     │
//! │              → extract → post-verify → commit → done           │
//! │  verify_and_repair(), versions(), enable/disable/uninstall()   │
//! └────────────────────────────────────────────────────────────────┘
//!        │               │                 │               │
//!        ▼               ▼                 ▼               ▼
//! ┌─────────────┐ ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │ManifestFetch│ │ Resumable    │ │ArchiveExtract│ │ Executable   │
//! │ (retries)   │ │ Downloader   │ │ (zip)        │ │ Resolver     │
//! └─────────────┘ └──────────────┘ └──────────────┘ └──────────────┘
//!        │               │
//!        └──────┬────────┘
//!               ▼
//!        ┌──────────────┐
//!        │HttpTransport │  reqwest in production, mock in tests
//!        └──────────────┘
//! ```
//!
//! [`SelfUpdater`] reuses the fetcher and downloader for launcher updates.
//! Every mutating flow takes a [`SingleFlight`] guard; progress and phase
//! changes are reported as [`PipelineEvent`]s to an [`EventSink`].

mod badge;
mod config;
pub mod download;
mod error;
mod events;
mod executable;
mod extractor;
mod fetch;
mod flight;
mod http;
mod installer;
mod launch;
mod repair;
mod toggle;
mod traits;
mod update;
mod verifier;

pub use badge::{read_installed, VersionBadge, VersionsReport};
pub use config::ManagerConfig;
pub use download::{DownloadOutcome, DownloadProgress, ResumableDownloader, TransferPhase};
pub use error::{ManagerError, ManagerResult};
pub use events::{ChannelSink, EventSink, InstallPhase, NullSink, PipelineEvent};
pub use executable::{
    resolve_install_root, ExecutableResolver, ExecutableStatus, ExecutableValidator,
};
pub use extractor::ZipExtractor;
pub use fetch::ManifestFetcher;
pub use flight::{FlightGuard, FlightKey, SingleFlight};
pub use http::{BodyStream, HttpResponse, HttpTransport, ReqwestTransport, USER_AGENT};
pub use installer::{InstallReport, PatchInstaller};
pub use launch::{launch_game, DetachedLauncher};
pub use repair::RepairReport;
pub use toggle::{
    disable_root, disabled_path, enable_root, patch_state, uninstall_root, PatchState,
    DISABLED_SUFFIX,
};
pub use traits::{ArchiveExtractor, BoxFuture, ExecutableSelector, ProcessLauncher};
pub use update::{SelfUpdater, UpdateCheck, UPDATE_FILE_NAME};
pub use verifier::{resolve_under_root, verify_files, verify_install, VerifyIssue, VerifyReason};
