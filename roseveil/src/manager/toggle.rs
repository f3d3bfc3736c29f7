//! Enable, disable and uninstall the installed patch.
//!
//! A disabled patch is the install root renamed to a sibling with a
//! `.disabled` suffix. Uninstall deletes whichever of the two exists.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::error::{ManagerError, ManagerResult};
use super::executable::resolve_install_root;
use super::flight::FlightKey;
use super::installer::PatchInstaller;

/// Suffix appended to the install root's last component when disabled.
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Where the patch currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchState {
    Enabled,
    Disabled,
    NotInstalled,
}

/// Sibling path used while the patch is disabled.
pub fn disabled_path(install_root: &Path) -> PathBuf {
    let mut name: OsString = install_root
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(DISABLED_SUFFIX);
    install_root.with_file_name(name)
}

/// Current state of `install_root`.
pub fn patch_state(install_root: &Path) -> PatchState {
    if install_root.is_dir() {
        PatchState::Enabled
    } else if disabled_path(install_root).is_dir() {
        PatchState::Disabled
    } else {
        PatchState::NotInstalled
    }
}

/// Rename the disabled directory back, if only the disabled one exists.
pub async fn enable_root(install_root: &Path) -> ManagerResult<PatchState> {
    let disabled = disabled_path(install_root);
    if disabled.is_dir() && !install_root.exists() {
        rename(&disabled, install_root).await?;
        info!(root = %install_root.display(), "patch enabled");
    }
    Ok(patch_state(install_root))
}

/// Rename the install root aside, if only the enabled one exists.
pub async fn disable_root(install_root: &Path) -> ManagerResult<PatchState> {
    let disabled = disabled_path(install_root);
    if install_root.is_dir() && !disabled.exists() {
        rename(install_root, &disabled).await?;
        info!(root = %install_root.display(), "patch disabled");
    }
    Ok(patch_state(install_root))
}

/// Delete the enabled directory, else the disabled one. Returns what was removed.
pub async fn uninstall_root(install_root: &Path) -> ManagerResult<Option<PathBuf>> {
    let disabled = disabled_path(install_root);
    let target = if install_root.is_dir() {
        install_root.to_path_buf()
    } else if disabled.is_dir() {
        disabled
    } else {
        return Ok(None);
    };

    tokio::fs::remove_dir_all(&target)
        .await
        .map_err(|e| ManagerError::RemoveFailed {
            path: target.clone(),
            source: e,
        })?;
    info!(path = %target.display(), "patch uninstalled");
    Ok(Some(target))
}

async fn rename(from: &Path, to: &Path) -> ManagerResult<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| ManagerError::RenameFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        })
}

impl PatchInstaller {
    /// Install root of the configured executable, without prompting.
    async fn configured_root(&self) -> ManagerResult<PathBuf> {
        let exe = self.exe.current().await?;
        Ok(resolve_install_root(&exe, &self.config.dest_subdir))
    }

    /// Where the patch currently lives.
    pub async fn state(&self) -> ManagerResult<PatchState> {
        Ok(patch_state(&self.configured_root().await?))
    }

    /// Re-enable a disabled patch.
    pub async fn enable(&self) -> ManagerResult<PatchState> {
        let root = self.configured_root().await?;
        let _guard = self.flight.acquire(FlightKey::install_root(&root), "enable")?;
        enable_root(&root).await
    }

    /// Disable the patch without deleting it.
    pub async fn disable(&self) -> ManagerResult<PatchState> {
        let root = self.configured_root().await?;
        let _guard = self.flight.acquire(FlightKey::install_root(&root), "disable")?;
        disable_root(&root).await
    }

    /// Delete the patch, enabled or disabled.
    pub async fn uninstall(&self) -> ManagerResult<Option<PathBuf>> {
        let root = self.configured_root().await?;
        let _guard = self
            .flight
            .acquire(FlightKey::install_root(&root), "uninstall")?;
        uninstall_root(&root).await
    }
}
