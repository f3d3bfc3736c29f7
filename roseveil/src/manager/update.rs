//! Launcher self-update.
//!
//! The update manifest uses the same shape as the patch manifest
//! (`version`, `url`, optional `sha256`). Installing downloads the new
//! installer into the staging directory, checks it, and hands it to the
//! process launcher. The caller is expected to exit afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::ManagerConfig;
use super::download::{ensure_digest, partial_path, DownloadProgress, ResumableDownloader};
use super::error::{ManagerError, ManagerResult};
use super::events::{EventSink, InstallPhase, PipelineEvent};
use super::fetch::ManifestFetcher;
use super::flight::{FlightKey, SingleFlight};
use super::http::{HttpTransport, USER_AGENT};
use super::installer::remove_file_if_exists;
use super::traits::ProcessLauncher;
use crate::package::is_newer;

/// File name of the downloaded installer inside the staging directory.
pub const UPDATE_FILE_NAME: &str = "roseveil_update.bin";

const UPDATE_FETCH_ATTEMPTS: u32 = 2;

/// Result of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCheck {
    /// Whether `latest` is newer than `current`.
    pub newer: bool,
    pub latest: String,
    pub url: String,
    pub sha256: Option<String>,
    pub current: String,
}

/// Checks for and installs launcher updates.
pub struct SelfUpdater {
    manifest_url: String,
    fetcher: ManifestFetcher,
    downloader: ResumableDownloader,
    launcher: Arc<dyn ProcessLauncher>,
    staging_dir: PathBuf,
    skip_checksum: bool,
    flight: SingleFlight,
    cancel: Option<CancellationToken>,
}

impl SelfUpdater {
    pub fn new(
        config: &ManagerConfig,
        transport: Arc<dyn HttpTransport>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let fetcher = ManifestFetcher::new(Arc::clone(&transport))
            .with_max_attempts(UPDATE_FETCH_ATTEMPTS)
            .with_retry_delay(config.retry_delay)
            .with_request_timeout(config.request_timeout)
            .with_header("User-Agent", USER_AGENT)
            .with_header("Accept", "application/json");
        let downloader = ResumableDownloader::new(transport)
            .with_timeout(config.download_timeout)
            .with_resume_attempts(config.resume_attempts);

        Self {
            manifest_url: config.update_manifest_url.clone(),
            fetcher,
            downloader,
            launcher,
            staging_dir: config.staging_dir.clone(),
            skip_checksum: config.skip_checksum,
            flight: SingleFlight::new(),
            cancel: None,
        }
    }

    /// Share the pipeline slot with the patch installer.
    pub fn with_flight(mut self, flight: SingleFlight) -> Self {
        self.flight = flight;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Delay between the two manifest attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.fetcher = self.fetcher.with_retry_delay(delay);
        self
    }

    /// Where the installer is downloaded to.
    pub fn installer_path(&self) -> PathBuf {
        self.staging_dir.join(UPDATE_FILE_NAME)
    }

    /// Compare the published launcher version with `current`.
    pub async fn check(&self, current: &str) -> ManagerResult<UpdateCheck> {
        if self.manifest_url.is_empty() {
            return Err(ManagerError::InvalidConfig(
                "launcher.update_manifest_url is not set".to_string(),
            ));
        }

        let manifest = self.fetcher.fetch(&self.manifest_url).await?;
        let newer = is_newer(&manifest.version, current);
        info!(current, latest = %manifest.version, newer, "launcher update checked");

        Ok(UpdateCheck {
            newer,
            sha256: manifest.archive_digest().map(str::to_string),
            latest: manifest.version,
            url: manifest.url,
            current: current.to_string(),
        })
    }

    /// Download, verify and start the installer described by `update`.
    ///
    /// Always ends with a `done` event.
    pub async fn install(&self, update: &UpdateCheck, sink: &dyn EventSink) -> ManagerResult<PathBuf> {
        let result = self.run_install(update, sink).await;
        match &result {
            Ok(path) => {
                info!(version = %update.latest, installer = %path.display(), "launcher installer started");
                sink.emit(&PipelineEvent::succeeded(format!(
                    "Started installer for {}",
                    update.latest
                )));
            }
            Err(e) => {
                warn!(error = %e, "launcher update failed");
                sink.emit(&PipelineEvent::failed(e));
            }
        }
        result
    }

    async fn run_install(&self, update: &UpdateCheck, sink: &dyn EventSink) -> ManagerResult<PathBuf> {
        if update.url.is_empty() {
            return Err(ManagerError::InvalidConfig("update has no URL".to_string()));
        }
        let _pipeline = self.flight.acquire(FlightKey::Pipeline, "launcher update")?;

        let path = self.installer_path();
        remove_file_if_exists(&path).await?;
        remove_file_if_exists(&partial_path(&path)).await?;

        sink.emit(&PipelineEvent::status(InstallPhase::Download, "Downloading update…"));
        let progress = |p: &DownloadProgress| sink.emit(&PipelineEvent::Progress(*p));
        let outcome = self
            .downloader
            .download_with_cancel(&update.url, &path, Some(&progress), self.cancel.as_ref())
            .await?;

        sink.emit(&PipelineEvent::status(
            InstallPhase::VerifyChecksum,
            "Verifying installer…",
        ));
        match update.sha256.as_deref() {
            Some(_) if self.skip_checksum => {
                warn!(checksum_override = true, actual = %outcome.sha256, "installer checksum NOT verified (developer override)");
            }
            Some(expected) => {
                ensure_digest("installer", Some(expected), &outcome.sha256)?;
                info!(checksum = "ok", "installer checksum verified");
            }
            None => warn!("update manifest declares no installer checksum"),
        }

        mark_executable(&path).await?;
        self.launcher.spawn_detached(&path, &[])?;
        Ok(path)
    }
}

impl std::fmt::Debug for SelfUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfUpdater")
            .field("manifest_url", &self.manifest_url)
            .field("staging_dir", &self.staging_dir)
            .field("skip_checksum", &self.skip_checksum)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> ManagerResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| ManagerError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> ManagerResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::manager::events::tests::RecordingSink;
    use crate::manager::http::tests::MockTransport;
    use crate::manager::installer::tests::sha;

    const UPDATE_URL: &str = "https://cdn.example.com/launcher/latest.json";
    const INSTALLER_URL: &str = "https://cdn.example.com/launcher/setup-2.0.0.exe";

    #[derive(Default)]
    struct RecordingLauncher {
        spawned: Mutex<Vec<PathBuf>>,
    }

    impl ProcessLauncher for RecordingLauncher {
        fn spawn_detached(&self, program: &Path, _args: &[String]) -> ManagerResult<()> {
            self.spawned.lock().unwrap().push(program.to_path_buf());
            Ok(())
        }
    }

    struct Harness {
        _temp: TempDir,
        mock: Arc<MockTransport>,
        launcher: Arc<RecordingLauncher>,
        updater: SelfUpdater,
    }

    fn harness(skip_checksum: bool) -> Harness {
        let temp = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new());
        let launcher = Arc::new(RecordingLauncher::default());
        let config = ManagerConfig::default()
            .with_update_manifest(UPDATE_URL)
            .with_staging_dir(temp.path().join("staging"))
            .with_skip_checksum(skip_checksum);
        let updater = SelfUpdater::new(
            &config,
            Arc::clone(&mock) as Arc<dyn HttpTransport>,
            Arc::clone(&launcher) as Arc<dyn ProcessLauncher>,
        )
        .with_retry_delay(Duration::from_millis(1));

        Harness {
            _temp: temp,
            mock,
            launcher,
            updater,
        }
    }

    fn update(sha256: Option<String>) -> UpdateCheck {
        UpdateCheck {
            newer: true,
            latest: "2.0.0".to_string(),
            url: INSTALLER_URL.to_string(),
            sha256,
            current: "1.4.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_check_reports_newer() {
        let h = harness(false);
        h.mock.serve(
            UPDATE_URL,
            format!(r#"{{"version":"2.0.0","url":"{INSTALLER_URL}","sha256":"AB"}}"#),
        );

        let check = h.updater.check("1.4.0").await.unwrap();
        assert!(check.newer);
        assert_eq!(check.latest, "2.0.0");
        assert_eq!(check.sha256.as_deref(), Some("AB"));

        let same = h.updater.check("2.0").await.unwrap();
        assert!(!same.newer);

        let request = &h.mock.requests()[0];
        assert_eq!(request.header("User-Agent"), Some(USER_AGENT));
        assert_eq!(request.header("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_check_uses_two_attempts() {
        let h = harness(false);
        let result = h.updater.check("1.0.0").await;
        assert!(matches!(result, Err(ManagerError::ManifestFetch { attempts: 2, .. })));
        assert_eq!(h.mock.request_count(UPDATE_URL), 2);
    }

    #[tokio::test]
    async fn test_check_without_url_is_config_error() {
        let mut h = harness(false);
        h.updater.manifest_url.clear();
        assert!(matches!(
            h.updater.check("1.0.0").await,
            Err(ManagerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_install_verifies_and_launches() {
        let h = harness(false);
        let body = b"installer bytes".to_vec();
        h.mock.serve(INSTALLER_URL, body.clone());
        std::fs::create_dir_all(&h.updater.staging_dir).unwrap();
        std::fs::write(partial_path(&h.updater.installer_path()), b"stale").unwrap();

        let sink = RecordingSink::default();
        let path = h
            .updater
            .install(&update(Some(sha(&body).to_uppercase())), &sink)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert_eq!(*h.launcher.spawned.lock().unwrap(), vec![path]);
        assert!(matches!(sink.last(), Some(PipelineEvent::Done { ok: true, .. })));
        let request = h.mock.requests().into_iter().find(|r| r.url == INSTALLER_URL).unwrap();
        assert_eq!(request.header("Range"), None);
    }

    #[tokio::test]
    async fn test_install_rejects_bad_digest() {
        let h = harness(false);
        h.mock.serve(INSTALLER_URL, b"tampered".to_vec());

        let sink = RecordingSink::default();
        let result = h.updater.install(&update(Some("00".repeat(32))), &sink).await;

        match result {
            Err(ManagerError::ChecksumMismatch { filename, .. }) => assert_eq!(filename, "installer"),
            other => panic!("Expected ChecksumMismatch, got {other:?}"),
        }
        assert!(h.launcher.spawned.lock().unwrap().is_empty());
        assert!(matches!(sink.last(), Some(PipelineEvent::Done { ok: false, .. })));
    }

    #[tokio::test]
    async fn test_install_override_skips_digest() {
        let h = harness(true);
        h.mock.serve(INSTALLER_URL, b"tampered".to_vec());

        h.updater
            .install(&update(Some("00".repeat(32))), &RecordingSink::default())
            .await
            .unwrap();
        assert_eq!(h.launcher.spawned.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_install_blocked_by_running_pipeline() {
        let h = harness(false);
        let flight = SingleFlight::new();
        let updater = h.updater.with_flight(flight.clone());
        let _held = flight.acquire(FlightKey::Pipeline, "patch install").unwrap();

        let result = updater.install(&update(None), &RecordingSink::default()).await;
        assert!(matches!(result, Err(ManagerError::Busy(_))));
        assert_eq!(h.mock.request_count(INSTALLER_URL), 0);
    }
}
