//! Game executable validation and install-root resolution.
//!
//! The install root is derived from the configured executable:
//! `parent(exe) / dest_subdir`. Everything that mutates the install root
//! first makes sure a valid executable is configured, asking an
//! [`ExecutableSelector`] when it is not.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::download::checksum::{calculate_file_checksum, digests_match};
use super::error::{ManagerError, ManagerResult};
use super::traits::ExecutableSelector;
use crate::config::{ConfigStore, ExeSettings};

/// Accepts a path iff it names the expected executable (and, when an
/// allow-list is configured, hashes to one of the allowed digests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableValidator {
    exe_name: String,
    allowlist: Vec<String>,
}

impl ExecutableValidator {
    pub fn new(exe_name: impl Into<String>, allowlist: Vec<String>) -> Self {
        Self {
            exe_name: exe_name.into(),
            allowlist,
        }
    }

    pub fn from_settings(settings: &ExeSettings) -> Self {
        Self::new(settings.name.clone(), settings.sha256_allowlist.clone())
    }

    /// Required file name.
    pub fn exe_name(&self) -> &str {
        &self.exe_name
    }

    /// Check `path`, explaining the first failed condition.
    pub fn validate(&self, path: &Path) -> ManagerResult<()> {
        let reject = |reason: String| Err(ManagerError::ExecutableNotConfigured(reason));

        if !path.is_file() {
            return reject(format!("{} does not exist", path.display()));
        }

        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n == self.exe_name);
        if !name_matches {
            return reject(format!(
                "{} is not {}",
                path.display(),
                self.exe_name
            ));
        }

        if !self.allowlist.is_empty() {
            let actual = calculate_file_checksum(path)?;
            if !self.allowlist.iter().any(|allowed| digests_match(allowed, &actual)) {
                return reject(format!(
                    "{} is not a supported build (sha256 {actual})",
                    path.display()
                ));
            }
        }

        Ok(())
    }

    /// Whether `path` passes [`validate`](Self::validate).
    pub fn is_valid(&self, path: &Path) -> bool {
        self.validate(path).is_ok()
    }
}

/// Validity of the configured executable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExecutableStatus {
    pub ok: bool,
    /// Configured path, empty when none is stored.
    pub exe_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Directory the patch is installed into.
pub fn resolve_install_root(exe_path: &Path, dest_subdir: &str) -> PathBuf {
    let base = exe_path.parent().unwrap_or_else(|| Path::new("."));
    let mut root = base.to_path_buf();
    for segment in dest_subdir.split(['/', '\\']).filter(|s| !s.is_empty()) {
        root.push(segment);
    }
    root
}

/// Resolves the executable from the config store, prompting when needed.
#[derive(Clone)]
pub struct ExecutableResolver {
    store: Arc<ConfigStore>,
    validator: ExecutableValidator,
    selector: Option<Arc<dyn ExecutableSelector>>,
}

impl ExecutableResolver {
    pub fn new(store: Arc<ConfigStore>, validator: ExecutableValidator) -> Self {
        Self {
            store,
            validator,
            selector: None,
        }
    }

    /// Ask `selector` when no valid executable is stored.
    pub fn with_selector(mut self, selector: Arc<dyn ExecutableSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn validator(&self) -> &ExecutableValidator {
        &self.validator
    }

    /// Status of the stored executable without prompting.
    pub async fn status(&self) -> ExecutableStatus {
        let Some(path) = self.store.exe_path() else {
            return ExecutableStatus {
                ok: false,
                exe_path: String::new(),
                reason: Some("no executable selected".to_string()),
            };
        };

        let result = self.validate_off_thread(&path).await;
        ExecutableStatus {
            ok: result.is_ok(),
            exe_path: path.display().to_string(),
            reason: result.err().map(|e| e.to_string()),
        }
    }

    /// The stored executable if valid.
    pub async fn current(&self) -> ManagerResult<PathBuf> {
        let path = self.store.exe_path().ok_or_else(|| {
            ManagerError::ExecutableNotConfigured("no executable selected".to_string())
        })?;
        self.validate_off_thread(&path).await?;
        Ok(path)
    }

    /// The stored executable, or one obtained from the selector and persisted.
    pub async fn ensure(&self) -> ManagerResult<PathBuf> {
        match self.current().await {
            Ok(path) => Ok(path),
            Err(err) => {
                let Some(selector) = &self.selector else {
                    return Err(err);
                };
                debug!(error = %err, "no valid executable configured, asking selector");
                let chosen = selector.select(&self.validator).await?;
                self.select(&chosen).await?;
                Ok(chosen)
            }
        }
    }

    /// Validate `path` and store it as the executable.
    pub async fn select(&self, path: &Path) -> ManagerResult<()> {
        self.validate_off_thread(path).await?;
        self.store
            .set_exe_path(path)
            .map_err(|e| ManagerError::InvalidConfig(e.to_string()))?;
        info!(path = %path.display(), "game executable selected");
        Ok(())
    }

    /// Install root for the valid configured executable.
    pub async fn install_root(&self, dest_subdir: &str) -> ManagerResult<PathBuf> {
        let exe = self.ensure().await?;
        Ok(resolve_install_root(&exe, dest_subdir))
    }

    // Hashing a game binary against the allow-list can take a while.
    async fn validate_off_thread(&self, path: &Path) -> ManagerResult<()> {
        let validator = self.validator.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || validator.validate(&owned))
            .await
            .map_err(|e| ManagerError::ReadFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?
    }
}

impl std::fmt::Debug for ExecutableResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableResolver")
            .field("store", &self.store)
            .field("validator", &self.validator)
            .field("has_selector", &self.selector.is_some())
            .finish()
    }
}
