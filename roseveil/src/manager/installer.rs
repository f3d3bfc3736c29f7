//! Patch installer.
//!
//! This module orchestrates the install state machine:
//! 1. `manifest` - fetch the patch manifest
//! 2. `precondition` - make sure a valid game executable is configured
//! 3. `download` - fetch the archive into the staging directory
//! 4. `verify-checksum` - compare the archive digest with the manifest
//! 5. `extract` - expand the archive over the install root
//! 6. `post-verify` - check every file the manifest lists
//! 7. `commit` - write `installed.json`
//! 8. `done`
//!
//! Any phase may fail; later phases never run after a failure. The install
//! record is written last, so an interrupted install never claims success.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ManagerConfig;
use super::download::{
    calculate_file_checksum, digests_match, ensure_digest, partial_path, DownloadProgress,
    ResumableDownloader,
};
use super::error::{ManagerError, ManagerResult};
use super::events::{EventSink, InstallPhase, PipelineEvent};
use super::executable::ExecutableResolver;
use super::extractor::ZipExtractor;
use super::fetch::ManifestFetcher;
use super::flight::{FlightGuard, FlightKey, SingleFlight};
use super::http::HttpTransport;
use super::traits::ArchiveExtractor;
use super::verifier::verify_install;
use crate::package::{InstallRecord, Manifest};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Installed version.
    pub version: String,
    /// Directory the archive was extracted into.
    pub install_root: PathBuf,
    /// Path of the written install record.
    pub record_path: PathBuf,
    /// Size of the archive in bytes.
    pub archive_bytes: u64,
    /// Number of files the archive contained.
    pub files_extracted: usize,
    /// Whether checksum checks were skipped by the developer override.
    pub checksum_skipped: bool,
}

/// An archive ready for extraction.
#[derive(Debug, Clone)]
pub(crate) struct StagedArchive {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Downloads, verifies and installs the patch.
pub struct PatchInstaller {
    pub(crate) config: ManagerConfig,
    pub(crate) fetcher: ManifestFetcher,
    pub(crate) downloader: ResumableDownloader,
    pub(crate) extractor: Arc<dyn ArchiveExtractor>,
    pub(crate) exe: ExecutableResolver,
    pub(crate) flight: SingleFlight,
    pub(crate) cancel: Option<CancellationToken>,
}

impl PatchInstaller {
    /// Create an installer that talks to the network through `transport`.
    pub fn new(
        config: ManagerConfig,
        transport: Arc<dyn HttpTransport>,
        exe: ExecutableResolver,
    ) -> Self {
        let fetcher = ManifestFetcher::new(Arc::clone(&transport))
            .with_max_attempts(config.retry_attempts)
            .with_retry_delay(config.retry_delay)
            .with_request_timeout(config.request_timeout)
            .with_header("Accept", "application/json");
        let downloader = ResumableDownloader::new(transport)
            .with_timeout(config.download_timeout)
            .with_resume_attempts(config.resume_attempts);

        Self {
            config,
            fetcher,
            downloader,
            extractor: Arc::new(ZipExtractor::new()),
            exe,
            flight: SingleFlight::new(),
            cancel: None,
        }
    }

    /// Use a different archive extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Share single-flight state with other managers (e.g. the self-updater).
    pub fn with_flight(mut self, flight: SingleFlight) -> Self {
        self.flight = flight;
        self
    }

    /// Abort downloads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn flight(&self) -> &SingleFlight {
        &self.flight
    }

    pub fn executable(&self) -> &ExecutableResolver {
        &self.exe
    }

    /// Run the install pipeline, reporting to `sink`.
    ///
    /// Always ends with a `done` event carrying the outcome.
    pub async fn install(&self, sink: &dyn EventSink) -> ManagerResult<InstallReport> {
        let result = self.run_install(sink).await;
        match &result {
            Ok(report) => {
                info!(version = %report.version, root = %report.install_root.display(), "patch installed");
                sink.emit(&PipelineEvent::succeeded(format!(
                    "Installed {} {}",
                    self.config.component, report.version
                )));
            }
            Err(e) => {
                warn!(error = %e, "patch install failed");
                sink.emit(&PipelineEvent::failed(e));
            }
        }
        result
    }

    async fn run_install(&self, sink: &dyn EventSink) -> ManagerResult<InstallReport> {
        let _pipeline = self.flight.acquire(FlightKey::Pipeline, "patch install")?;

        sink.emit(&PipelineEvent::status(InstallPhase::Manifest, "Fetching manifest…"));
        let manifest = self.fetcher.fetch(&self.config.manifest_url).await?;

        sink.emit(&PipelineEvent::status(
            InstallPhase::Precondition,
            "Checking game executable…",
        ));
        let install_root = self.exe.install_root(&self.config.dest_subdir).await?;

        sink.emit(&PipelineEvent::status(InstallPhase::Download, "Downloading patch…"));
        let archive = self
            .stage_archive(&manifest, self.config.resume_partial, sink)
            .await?;

        sink.emit(&PipelineEvent::status(
            InstallPhase::VerifyChecksum,
            "Verifying checksum…",
        ));
        self.check_archive(&manifest, &archive)?;

        let _root = self.lock_root(&install_root)?;
        sink.emit(&PipelineEvent::status(InstallPhase::Extract, "Extracting files…"));
        let files_extracted = self.extract(&archive.path, &install_root).await?;

        if manifest.has_file_list() {
            sink.emit(&PipelineEvent::status(
                InstallPhase::PostVerify,
                "Verifying installed files…",
            ));
            self.post_verify(&manifest, &install_root).await?;
        }

        sink.emit(&PipelineEvent::status(InstallPhase::Commit, "Saving install record…"));
        let record = InstallRecord::new(&self.config.component, &manifest.version);
        let record_path = record.write(&install_root).await?;

        self.discard_archive(&archive.path).await;
        sink.emit(&PipelineEvent::status(InstallPhase::Done, "Install complete"));

        Ok(InstallReport {
            version: manifest.version,
            install_root,
            record_path,
            archive_bytes: archive.bytes,
            files_extracted,
            checksum_skipped: self.config.skip_checksum,
        })
    }

    /// Staging path of the archive for `manifest`'s version.
    pub fn archive_path(&self, manifest: &Manifest) -> PathBuf {
        self.config.staging_dir.join(format!(
            "{}_{}.zip",
            sanitize(&self.config.component),
            sanitize(&manifest.version)
        ))
    }

    /// Produce a downloaded archive for `manifest`.
    ///
    /// With `reuse_existing`, a complete archive already in the staging
    /// directory is used when its digest still matches the manifest.
    /// Otherwise any previous archive is removed, along with its partial
    /// file unless cross-run resumption is enabled.
    pub(crate) async fn stage_archive(
        &self,
        manifest: &Manifest,
        reuse_existing: bool,
        sink: &dyn EventSink,
    ) -> ManagerResult<StagedArchive> {
        let path = self.archive_path(manifest);

        if reuse_existing && path.is_file() {
            if let Some(staged) = self.reusable_archive(manifest, &path).await? {
                return Ok(staged);
            }
        }

        remove_file_if_exists(&path).await?;
        if !self.config.resume_partial {
            remove_file_if_exists(&partial_path(&path)).await?;
        }

        let progress = |p: &DownloadProgress| sink.emit(&PipelineEvent::Progress(*p));
        let outcome = self
            .downloader
            .download_with_cancel(&manifest.url, &path, Some(&progress), self.cancel.as_ref())
            .await?;

        Ok(StagedArchive {
            path,
            sha256: outcome.sha256,
            bytes: outcome.bytes_written,
        })
    }

    async fn reusable_archive(
        &self,
        manifest: &Manifest,
        path: &Path,
    ) -> ManagerResult<Option<StagedArchive>> {
        let owned = path.to_path_buf();
        let sha256 = tokio::task::spawn_blocking(move || calculate_file_checksum(&owned))
            .await
            .map_err(|e| ManagerError::ReadFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })??;

        let matches = manifest
            .archive_digest()
            .is_some_and(|expected| digests_match(expected, &sha256));
        if !matches {
            debug!(path = %path.display(), "staged archive is stale, downloading again");
            return Ok(None);
        }

        let bytes = tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .unwrap_or_default();
        info!(path = %path.display(), "reusing staged archive");
        Ok(Some(StagedArchive {
            path: path.to_path_buf(),
            sha256,
            bytes,
        }))
    }

    /// Compare the archive digest with the manifest, honouring the override.
    pub(crate) fn check_archive(
        &self,
        manifest: &Manifest,
        archive: &StagedArchive,
    ) -> ManagerResult<()> {
        if self.config.skip_checksum {
            warn!(
                checksum_override = true,
                archive = %archive.path.display(),
                actual = %archive.sha256,
                "archive checksum NOT verified (developer override)"
            );
            return Ok(());
        }

        let label = archive
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| manifest.archive_name().to_string());
        ensure_digest(&label, manifest.archive_digest(), &archive.sha256)?;
        info!(checksum = "ok", archive = %label, "archive checksum verified");
        Ok(())
    }

    /// Take the install-root guard.
    pub(crate) fn lock_root(&self, install_root: &Path) -> ManagerResult<FlightGuard> {
        self.flight
            .acquire(FlightKey::install_root(install_root), "extract")
    }

    /// Expand the archive over the install root.
    pub(crate) async fn extract(&self, archive: &Path, install_root: &Path) -> ManagerResult<usize> {
        tokio::fs::create_dir_all(install_root)
            .await
            .map_err(|e| ManagerError::CreateDirFailed {
                path: install_root.to_path_buf(),
                source: e,
            })?;
        let count = self.extractor.expand(archive, install_root).await?;
        debug!(files = count, root = %install_root.display(), "archive expanded");
        Ok(count)
    }

    async fn post_verify(&self, manifest: &Manifest, install_root: &Path) -> ManagerResult<()> {
        let issues = verify_install(&manifest.files, install_root).await?;
        if issues.is_empty() {
            info!(checksum = "ok", files = manifest.files.len(), "installed files verified");
            return Ok(());
        }

        if self.config.skip_checksum {
            warn!(
                checksum_override = true,
                failed = issues.len(),
                "post-install verification failures ignored (developer override)"
            );
            return Ok(());
        }
        Err(ManagerError::PostVerifyFailed {
            failed: issues.len(),
        })
    }

    /// Remove the staged archive unless archives are kept.
    pub(crate) async fn discard_archive(&self, archive: &Path) {
        if self.config.keep_archives {
            return;
        }
        if let Err(e) = remove_file_if_exists(archive).await {
            // Best effort; a leftover archive is reused or replaced next time.
            warn!(error = %e, "failed to remove staged archive");
        }
    }
}

impl std::fmt::Debug for PatchInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchInstaller")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .field("downloader", &self.downloader)
            .finish_non_exhaustive()
    }
}

/// Keep a version or component id safe for use in a file name.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) async fn remove_file_if_exists(path: &Path) -> ManagerResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManagerError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
