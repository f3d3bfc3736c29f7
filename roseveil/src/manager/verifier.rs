//! Post-install verification of extracted files.
//!
//! Every file a manifest declares is resolved under the install root and
//! hashed. Problems are collected, never raised: the caller decides whether
//! a non-empty report is fatal.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::download::checksum::{calculate_file_checksum, digests_match};
use super::error::{ManagerError, ManagerResult};
use crate::package::ManifestFile;

/// Why a declared file failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyReason {
    /// The file does not exist.
    Missing,
    /// The file's digest differs from the manifest.
    Checksum,
    /// The file could not be read, or its path is not inside the root.
    Read,
}

impl VerifyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Checksum => "checksum",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for VerifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyIssue {
    /// Path as declared in the manifest.
    pub path: String,
    pub reason: VerifyReason,
}

/// Resolve a manifest-relative path under `root`.
///
/// Leading separators are stripped and both `/` and `\` separate segments.
/// Returns `None` for paths that would leave the root (`..`, drive prefixes).
pub fn resolve_under_root(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for segment in relative.split(['/', '\\']) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => resolved.push(part),
            _ => return None,
        }
    }
    Some(resolved)
}

/// Verify `files` under `root` on the current thread.
pub fn verify_files(files: &[ManifestFile], root: &Path) -> Vec<VerifyIssue> {
    let mut issues = Vec::new();
    for file in files {
        if let Some(reason) = check_file(file, root) {
            debug!(path = %file.path, %reason, "installed file failed verification");
            issues.push(VerifyIssue {
                path: file.path.clone(),
                reason,
            });
        }
    }
    issues
}

/// Verify `files` under `root` on the blocking pool.
///
/// Returns an empty list when every file matches.
pub async fn verify_install(files: &[ManifestFile], root: &Path) -> ManagerResult<Vec<VerifyIssue>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let owned_files = files.to_vec();
    let owned_root = root.to_path_buf();
    tokio::task::spawn_blocking(move || verify_files(&owned_files, &owned_root))
        .await
        .map_err(|e| ManagerError::ReadFailed {
            path: root.to_path_buf(),
            source: io::Error::other(e),
        })
}

fn check_file(file: &ManifestFile, root: &Path) -> Option<VerifyReason> {
    let Some(path) = resolve_under_root(root, &file.path) else {
        return Some(VerifyReason::Read);
    };

    match std::fs::metadata(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Some(VerifyReason::Missing),
        Err(_) => return Some(VerifyReason::Read),
    }

    match calculate_file_checksum(&path) {
        Ok(actual) if digests_match(&file.sha256, &actual) => None,
        Ok(_) => Some(VerifyReason::Checksum),
        Err(_) => Some(VerifyReason::Read),
    }
}
