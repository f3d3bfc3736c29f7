//! Configuration for the patch manager.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;

/// Configuration for the install, repair and self-update flows.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// URL of the patch manifest.
    pub manifest_url: String,

    /// URL of the launcher self-update manifest.
    pub update_manifest_url: String,

    /// Install subpath below the game executable's directory.
    pub dest_subdir: String,

    /// Component id written to the install record.
    pub component: String,

    /// Directory for downloaded archives and installers.
    pub staging_dir: PathBuf,

    /// Bound on a single manifest request.
    pub request_timeout: Duration,

    /// Bound on a whole archive download.
    pub download_timeout: Duration,

    /// Manifest fetch attempts.
    pub retry_attempts: u32,

    /// Linear backoff step between manifest attempts.
    pub retry_delay: Duration,

    /// Requests one download may issue after dropped connections.
    pub resume_attempts: u32,

    /// Trusted developer override: skip archive and post-install checks.
    pub skip_checksum: bool,

    /// Whether to keep the verified archive after a successful install.
    pub keep_archives: bool,

    /// Whether a `.part` file from an earlier run may be continued.
    pub resume_partial: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            update_manifest_url: String::new(),
            dest_subdir: "DLC/nsfw".to_string(),
            component: "nsfw_patch".to_string(),
            staging_dir: std::env::temp_dir().join("roseveil"),
            request_timeout: Duration::from_secs(12),
            download_timeout: Duration::from_secs(1800),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
            resume_attempts: 3,
            skip_checksum: false,
            keep_archives: false,
            resume_partial: false,
        }
    }
}

impl ManagerConfig {
    /// Create a configuration for the given patch manifest.
    pub fn new(manifest_url: impl Into<String>) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            ..Default::default()
        }
    }

    /// Derive the manager configuration from resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            manifest_url: settings.patch.manifest_url.clone(),
            update_manifest_url: settings.launcher.update_manifest_url.clone(),
            dest_subdir: settings.patch.dest_subdir.clone(),
            component: settings.patch.component.clone(),
            staging_dir: settings.patch.staging_dir.clone(),
            request_timeout: settings.network.request_timeout(),
            download_timeout: settings.network.download_timeout(),
            retry_attempts: settings.network.retry_attempts,
            retry_delay: settings.network.retry_delay(),
            resume_attempts: settings.network.resume_attempts,
            skip_checksum: settings.dev.skip_checksum,
            keep_archives: settings.patch.keep_archives,
            resume_partial: settings.patch.resume_partial,
        }
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, path: PathBuf) -> Self {
        self.staging_dir = path;
        self
    }

    /// Set the install subpath.
    pub fn with_dest_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.dest_subdir = subdir.into();
        self
    }

    /// Set the self-update manifest URL.
    pub fn with_update_manifest(mut self, url: impl Into<String>) -> Self {
        self.update_manifest_url = url.into();
        self
    }

    /// Set the manifest retry policy.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Set the whole-download bound.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Enable or disable the checksum override.
    pub fn with_skip_checksum(mut self, skip: bool) -> Self {
        self.skip_checksum = skip;
        self
    }

    /// Enable or disable keeping downloaded archives.
    pub fn with_keep_archives(mut self, keep: bool) -> Self {
        self.keep_archives = keep;
        self
    }

    /// Allow or forbid continuing partial files across runs.
    pub fn with_resume_partial(mut self, resume: bool) -> Self {
        self.resume_partial = resume;
        self
    }
}
