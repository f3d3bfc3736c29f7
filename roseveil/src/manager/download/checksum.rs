//! SHA-256 digests for archive and installed-file verification.
//!
//! Digests are lowercase hex strings. Comparison is case-insensitive because
//! manifests are hand-edited and some publishers emit uppercase hex.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::manager::error::{ManagerError, ManagerResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate SHA-256 checksum of a file.
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the file contents.
///
/// # Errors
///
/// Returns [`ManagerError::ReadFailed`] if the file cannot be opened or read.
pub fn calculate_file_checksum(path: &Path) -> ManagerResult<String> {
    let mut file = File::open(path).map_err(|e| ManagerError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ManagerError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Case-insensitive comparison of two hex digests.
///
/// Surrounding whitespace is ignored. An empty expectation never matches.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    let expected = expected.trim();
    !expected.is_empty() && expected.eq_ignore_ascii_case(actual.trim())
}

/// Compare a computed digest against an expected one.
///
/// `label` names the artifact in the resulting error (usually a file name).
/// A missing expectation (`None` or empty) is reported as a mismatch.
pub fn ensure_digest(label: &str, expected: Option<&str>, actual: &str) -> ManagerResult<()> {
    let expected = expected.unwrap_or_default();
    if digests_match(expected, actual) {
        return Ok(());
    }
    Err(ManagerError::ChecksumMismatch {
        filename: label.to_string(),
        expected: if expected.trim().is_empty() {
            "(none)".to_string()
        } else {
            expected.trim().to_lowercase()
        },
        actual: actual.to_lowercase(),
    })
}
