//! Progress values reported while a transfer is streaming.

use serde::Serialize;

/// Phase tag carried by every progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    Downloading,
}

/// Snapshot of a running download.
///
/// `downloaded` counts bytes already on disk, including any partial-file
/// prefix that was resumed, so consecutive values never decrease within one
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub phase: TransferPhase,
    pub downloaded: u64,
    /// Declared total size, or 0 when the server did not send one.
    pub total: u64,
    /// 0.0 - 100.0, or 0.0 when `total` is unknown.
    pub percent: f64,
}

impl DownloadProgress {
    /// Build a progress value, deriving the percentage.
    pub fn new(downloaded: u64, total: u64) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            (downloaded as f64 / total as f64) * 100.0
        };
        Self {
            phase: TransferPhase::Downloading,
            downloaded,
            total,
            percent,
        }
    }
}

/// Progress callback for a single transfer.
pub type ProgressCallback<'a> = &'a (dyn Fn(&DownloadProgress) + Send + Sync);
