//! Version badge shown next to the patch controls.
//!
//! Combines the latest manifest (if it could be fetched) with the install
//! record on disk. The record is read fresh on every query.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use super::error::ManagerResult;
use super::installer::PatchInstaller;
use super::toggle::disabled_path;
use crate::package::{compare_versions, InstallRecord, Manifest};

/// Classification of the installed patch against the latest manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VersionBadge {
    /// Installed version equals the latest.
    UpToDate { version: String },
    /// Installed version differs from the latest.
    Outdated { installed: String, latest: String },
    /// Manifest reachable, nothing installed.
    NotInstalled { latest: String },
    /// Manifest unreachable, something installed.
    Offline { installed: String },
    /// Manifest unreachable, nothing installed.
    Unavailable,
}

impl VersionBadge {
    /// Classify from the manifest fetch result and the installed version.
    pub fn resolve(latest: Option<&str>, installed: Option<&str>) -> Self {
        match (latest, installed) {
            (Some(latest), Some(installed))
                if compare_versions(installed, latest) == Ordering::Equal =>
            {
                Self::UpToDate {
                    version: installed.to_string(),
                }
            }
            (Some(latest), Some(installed)) => Self::Outdated {
                installed: installed.to_string(),
                latest: latest.to_string(),
            },
            (Some(latest), None) => Self::NotInstalled {
                latest: latest.to_string(),
            },
            (None, Some(installed)) => Self::Offline {
                installed: installed.to_string(),
            },
            (None, None) => Self::Unavailable,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> String {
        match self {
            Self::UpToDate { .. } => "installed / up to date".to_string(),
            Self::Outdated { installed, latest } => {
                format!("outdated, installed v{installed}, latest v{latest}")
            }
            Self::NotInstalled { .. } => "not installed".to_string(),
            Self::Offline { installed } => format!("installed v{installed} (offline)"),
            Self::Unavailable => "unavailable".to_string(),
        }
    }
}

impl fmt::Display for VersionBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Answer to a versions query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionsReport {
    pub manifest_version: Option<String>,
    pub installed_version: Option<String>,
    pub badge: VersionBadge,
    /// Why the manifest could not be fetched, if it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_error: Option<String>,
}

/// Read the install record from the enabled root, falling back to the
/// disabled sibling.
pub async fn read_installed(install_root: &Path) -> ManagerResult<Option<InstallRecord>> {
    if let Some(record) = InstallRecord::read(install_root).await? {
        return Ok(Some(record));
    }
    InstallRecord::read(&disabled_path(install_root)).await
}

impl PatchInstaller {
    /// Latest and installed versions plus the badge.
    ///
    /// Never prompts for the executable: without one, nothing counts as installed.
    pub async fn versions(&self) -> VersionsReport {
        let (manifest_version, manifest_error) =
            match self.fetcher.fetch(&self.config.manifest_url).await {
                Ok(Manifest { version, .. }) => (Some(version), None),
                Err(e) => {
                    debug!(error = %e, "manifest unavailable for version badge");
                    (None, Some(e.to_string()))
                }
            };

        let installed_version = match self.exe.current().await {
            Ok(exe) => {
                let root = super::executable::resolve_install_root(&exe, &self.config.dest_subdir);
                match read_installed(&root).await {
                    Ok(record) => record.map(|r| r.version),
                    Err(e) => {
                        debug!(error = %e, "install record unreadable");
                        None
                    }
                }
            }
            Err(_) => None,
        };

        let badge = VersionBadge::resolve(manifest_version.as_deref(), installed_version.as_deref());
        VersionsReport {
            manifest_version,
            installed_version,
            badge,
            manifest_error,
        }
    }
}
