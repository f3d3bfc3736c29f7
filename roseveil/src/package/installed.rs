//! Install record persisted inside the install root.
//!
//! `installed.json` is the only source of truth for which version of a
//! component is installed. It is written last, after extraction and
//! post-install verification, so its presence means the install completed.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::manager::{ManagerError, ManagerResult};

/// File name of the install record.
pub const INSTALL_RECORD_FILE: &str = "installed.json";

/// Marker of a completed installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Component identifier (e.g. `nsfw_patch`).
    pub component: String,
    /// Installed version.
    pub version: String,
    /// RFC 3339 timestamp of the install.
    #[serde(rename = "installedAt")]
    pub installed_at: String,
}

impl InstallRecord {
    /// Create a record stamped with the current UTC time.
    pub fn new(component: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            version: version.into(),
            installed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Path of the record file inside `install_root`.
    pub fn path_in(install_root: &Path) -> PathBuf {
        install_root.join(INSTALL_RECORD_FILE)
    }

    /// Read the record from `install_root`.
    ///
    /// A missing or unparseable record reads as `None`; only unexpected I/O
    /// failures are errors.
    pub async fn read(install_root: &Path) -> ManagerResult<Option<Self>> {
        let path = Self::path_in(install_root);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ManagerError::ReadFailed { path, source: e }),
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable install record");
                Ok(None)
            }
        }
    }

    /// Write the record into `install_root`, replacing any previous one.
    ///
    /// The record is written to a temporary sibling and renamed into place.
    pub async fn write(&self, install_root: &Path) -> ManagerResult<PathBuf> {
        let path = Self::path_in(install_root);
        let tmp = install_root.join(format!("{INSTALL_RECORD_FILE}.tmp"));

        let json = serde_json::to_vec_pretty(self).map_err(|e| ManagerError::WriteFailed {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| ManagerError::WriteFailed {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ManagerError::RenameFailed {
                from: tmp,
                to: path.clone(),
                source: e,
            })?;

        Ok(path)
    }
}
