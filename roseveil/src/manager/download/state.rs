//! Per-transfer state for resumable downloads.
//!
//! A transfer writes into a sidecar `<destination>.part` file and only renames
//! it onto the destination once the body has been fully received. The running
//! digest always covers exactly the bytes in the partial file, so a resumed
//! transfer ends with the digest of the complete content.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::manager::error::{ManagerError, ManagerResult};

/// Buffer size used when re-hashing an existing partial file (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Suffix of the in-progress sidecar file.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Path of the partial file that backs `dest` while it downloads.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Lowercase hex SHA-256 of the final file.
    pub sha256: String,
    /// Size of the final file in bytes.
    pub bytes_written: u64,
    /// Declared total size, or 0 when unknown.
    pub total_size: u64,
}

/// Ephemeral state of one in-flight download.
pub struct TransferState {
    /// Final destination.
    pub destination: PathBuf,
    /// Sidecar partial file.
    pub partial: PathBuf,
    /// Byte offset the current request starts at.
    pub offset: u64,
    /// Bytes on disk in the partial file (offset + bytes received so far).
    pub transferred: u64,
    /// Declared total size, or 0 when unknown.
    pub total_size: u64,
    hasher: Sha256,
}

impl std::fmt::Debug for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferState")
            .field("destination", &self.destination)
            .field("partial", &self.partial)
            .field("offset", &self.offset)
            .field("transferred", &self.transferred)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

impl TransferState {
    /// Inspect the destination's partial file and set the resume offset to its length.
    pub async fn inspect(destination: &Path) -> ManagerResult<Self> {
        let partial = partial_path(destination);
        let offset = match tokio::fs::metadata(&partial).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(ManagerError::ReadFailed {
                    path: partial,
                    source: e,
                })
            }
        };

        Ok(Self {
            destination: destination.to_path_buf(),
            partial,
            offset,
            transferred: offset,
            total_size: 0,
            hasher: Sha256::new(),
        })
    }

    /// Whether a non-empty partial file is being continued.
    pub fn is_resuming(&self) -> bool {
        self.offset > 0
    }

    /// Forget the partial prefix and start counting from zero.
    pub fn restart(&mut self) {
        self.offset = 0;
        self.transferred = 0;
        self.hasher = Sha256::new();
    }

    /// Feed the existing partial prefix into the digest.
    ///
    /// Only the first `offset` bytes are hashed; anything beyond that
    /// (there should be nothing) is ignored.
    pub async fn seed_digest_from_partial(&mut self) -> ManagerResult<()> {
        let mut file =
            tokio::fs::File::open(&self.partial)
                .await
                .map_err(|e| ManagerError::ReadFailed {
                    path: self.partial.clone(),
                    source: e,
                })?;

        let mut remaining = self.offset;
        let mut buffer = vec![0u8; BUFFER_SIZE];
        while remaining > 0 {
            let want = remaining.min(BUFFER_SIZE as u64) as usize;
            let read = file
                .read(&mut buffer[..want])
                .await
                .map_err(|e| ManagerError::ReadFailed {
                    path: self.partial.clone(),
                    source: e,
                })?;
            if read == 0 {
                break;
            }
            self.hasher.update(&buffer[..read]);
            remaining -= read as u64;
        }

        if remaining > 0 {
            // The file shrank underneath us; resuming would corrupt the output.
            return Err(ManagerError::ReadFailed {
                path: self.partial.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "partial file shorter than its recorded length",
                ),
            });
        }
        Ok(())
    }

    /// Record a chunk that was just written to the partial file.
    pub fn record(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.transferred += chunk.len() as u64;
    }

    /// Finalize the digest.
    pub fn finish(self) -> DownloadOutcome {
        DownloadOutcome {
            sha256: format!("{:x}", self.hasher.finalize()),
            bytes_written: self.transferred,
            total_size: self.total_size,
        }
    }
}
