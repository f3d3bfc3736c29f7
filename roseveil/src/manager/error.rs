//! Error types for the patch manager.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while fetching, downloading, verifying or
/// installing a patch or launcher update.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to rename a file or directory.
    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Failed to delete a file or directory.
    #[error("failed to remove {}: {source}", .path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Connection-level failure (DNS, refused, reset, broken body stream).
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// Request or download exceeded its time bound.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Server answered with a status outside 2xx.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Manifest body could not be located or parsed as JSON.
    #[error("[{url}] {reason}. Near: {snippet}")]
    ManifestParse {
        url: String,
        reason: String,
        snippet: String,
    },

    /// Manifest fetch failed on every attempt.
    #[error("failed to fetch manifest from {url} after {attempts} attempt(s): {reason}")]
    ManifestFetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// Archive transfer failed.
    #[error("failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The transfer was aborted through its cancellation token.
    #[error("download of {url} was cancelled")]
    Cancelled { url: String },

    /// Digest of a downloaded archive or installed file disagrees with the manifest.
    #[error("Checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Files failed verification after extraction.
    #[error("Post-install verify failed for {failed} file(s)")]
    PostVerifyFailed { failed: usize },

    /// Archive expansion failed.
    #[error("failed to extract {}: {reason}", .path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// No valid game executable is configured and none was selected.
    #[error("game executable not configured: {0}")]
    ExecutableNotConfigured(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another operation holds the same single-flight key.
    #[error("{0} is busy with another operation")]
    Busy(String),

    /// Failed to start an external process.
    #[error("failed to launch {}: {source}", .path.display())]
    LaunchFailed { path: PathBuf, source: io::Error },
}

impl ManagerError {
    /// Whether re-issuing the same request could plausibly succeed.
    ///
    /// Connection failures, timeouts and non-2xx statuses are transient.
    /// Parse, checksum, filesystem and configuration failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. }
        )
    }
}
