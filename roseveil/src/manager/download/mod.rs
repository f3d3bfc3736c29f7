//! Resumable archive downloads.
//!
//! This module provides:
//! - Single file downloads with resume support (`resumable`)
//! - SHA-256 checksum helpers (`checksum`)
//! - Per-transfer state and the `.part` sidecar convention (`state`)
//! - Progress values reported per chunk (`progress`)
//!
//! # Architecture
//!
//! ```text
//! ResumableDownloader
//!         │
//!         ├── HttpTransport (trait, reqwest or mock)
//!         │
//!         ├── TransferState (partial file, offset, running digest)
//!         │
//!         └── ProgressCallback (per-chunk updates)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use roseveil::manager::download::ResumableDownloader;
//! use roseveil::manager::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(12))?);
//! let downloader = ResumableDownloader::new(transport)
//!     .with_timeout(Duration::from_secs(1800));
//!
//! let outcome = downloader
//!     .download("https://cdn.example.com/patch.zip", &dest, Some(&|p| {
//!         println!("{:.1}%", p.percent);
//!     }))
//!     .await?;
//! println!("sha256 = {}", outcome.sha256);
//! ```

pub mod checksum;
mod progress;
mod resumable;
mod state;

pub use checksum::{calculate_file_checksum, digests_match, ensure_digest};
pub use progress::{DownloadProgress, ProgressCallback, TransferPhase};
pub use resumable::ResumableDownloader;
pub use state::{partial_path, DownloadOutcome, TransferState, PARTIAL_SUFFIX};
