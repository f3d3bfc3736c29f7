//! Verify and repair an existing install.
//!
//! Repair is a reduced install: verify what is on disk, and only if files
//! are missing or damaged, re-extract the archive over the install root and
//! verify again. It never writes or changes the install record.

use serde::Serialize;
use tracing::{info, warn};

use super::error::ManagerResult;
use super::events::{EventSink, InstallPhase, PipelineEvent};
use super::flight::FlightKey;
use super::installer::PatchInstaller;
use super::verifier::{verify_install, VerifyIssue};

/// Outcome of a verify/repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Whether the install is clean now.
    pub ok: bool,
    /// Whether files were re-extracted and now pass.
    pub repaired: bool,
    /// Files still failing verification.
    pub issues: usize,
    /// The failing files, for display.
    #[serde(skip)]
    pub details: Vec<VerifyIssue>,
}

impl PatchInstaller {
    /// Verify the install and repair it if needed, reporting to `sink`.
    ///
    /// Always ends with a `verify_done` event.
    pub async fn verify_and_repair(&self, sink: &dyn EventSink) -> ManagerResult<RepairReport> {
        let result = self.run_repair(sink).await;
        let event = match &result {
            Ok(report) => PipelineEvent::VerifyDone {
                ok: report.ok,
                repaired: report.repaired,
                issues: Some(report.issues),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "verify/repair failed");
                PipelineEvent::VerifyDone {
                    ok: false,
                    repaired: false,
                    issues: None,
                    error: Some(e.to_string()),
                }
            }
        };
        sink.emit(&event);
        result
    }

    async fn run_repair(&self, sink: &dyn EventSink) -> ManagerResult<RepairReport> {
        let _pipeline = self.flight.acquire(FlightKey::Pipeline, "verify/repair")?;

        sink.emit(&PipelineEvent::status(InstallPhase::Manifest, "Fetching manifest…"));
        let manifest = self.fetcher.fetch(&self.config.manifest_url).await?;

        sink.emit(&PipelineEvent::status(
            InstallPhase::Precondition,
            "Checking game executable…",
        ));
        let install_root = self.exe.install_root(&self.config.dest_subdir).await?;

        sink.emit(&PipelineEvent::status(
            InstallPhase::PostVerify,
            "Verifying installed files…",
        ));
        let issues = verify_install(&manifest.files, &install_root).await?;
        if issues.is_empty() {
            info!(root = %install_root.display(), "install verified clean");
            return Ok(RepairReport {
                ok: true,
                repaired: false,
                issues: 0,
                details: Vec::new(),
            });
        }
        info!(failed = issues.len(), "install needs repair");

        sink.emit(&PipelineEvent::status(InstallPhase::Download, "Downloading patch…"));
        let archive = self.stage_archive(&manifest, true, sink).await?;

        sink.emit(&PipelineEvent::status(
            InstallPhase::VerifyChecksum,
            "Verifying checksum…",
        ));
        self.check_archive(&manifest, &archive)?;

        let remaining = {
            let _root = self.lock_root(&install_root)?;
            sink.emit(&PipelineEvent::status(InstallPhase::Extract, "Extracting files…"));
            self.extract(&archive.path, &install_root).await?;

            sink.emit(&PipelineEvent::status(
                InstallPhase::PostVerify,
                "Verifying repaired files…",
            ));
            verify_install(&manifest.files, &install_root).await?
        };

        self.discard_archive(&archive.path).await;

        if remaining.is_empty() {
            info!(root = %install_root.display(), "install repaired");
            Ok(RepairReport {
                ok: true,
                repaired: true,
                issues: 0,
                details: Vec::new(),
            })
        } else {
            warn!(failed = remaining.len(), "files still failing after repair");
            Ok(RepairReport {
                ok: false,
                repaired: false,
                issues: remaining.len(),
                details: remaining,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::manager::config::ManagerConfig;
    use crate::manager::error::ManagerError;
    use crate::manager::events::tests::RecordingSink;
    use crate::manager::installer::tests::{sha, Fixture, ARCHIVE_URL, MANIFEST_URL};
    use crate::manager::NullSink;

    #[tokio::test]
    async fn test_clean_install_needs_no_repair() {
        let fx = Fixture::new();
        fx.serve_manifest("1.0.1", &sha(&fx.archive), true);
        let installer = fx.installer();
        installer.install(&NullSink).await.unwrap();

        let sink = RecordingSink::default();
        let report = installer.verify_and_repair(&sink).await.unwrap();

        assert!(report.ok);
        assert!(!report.repaired);
        assert_eq!(report.issues, 0);
        assert_eq!(fx.mock.request_count(ARCHIVE_URL), 1);
        assert_eq!(
            sink.last(),
            Some(PipelineEvent::VerifyDone {
                ok: true,
                repaired: false,
                issues: Some(0),
                error: None,
            })
        );
    }

    #[tokio::test]
    async fn test_deleted_file_is_repaired() {
        let fx = Fixture::new();
        fx.serve_manifest("1.0.1", &sha(&fx.archive), true);
        let installer = fx.installer();
        installer.install(&NullSink).await.unwrap();

        let damaged = fx.install_root().join("textures/skin.dds");
        fs::remove_file(&damaged).unwrap();

        let sink = RecordingSink::default();
        let report = installer.verify_and_repair(&sink).await.unwrap();

        assert!(report.ok);
        assert!(report.repaired);
        assert_eq!(report.issues, 0);
        assert_eq!(fs::read(&damaged).unwrap(), b"hello world");
        assert_eq!(
            sink.last(),
            Some(PipelineEvent::VerifyDone {
                ok: true,
                repaired: true,
                issues: Some(0),
                error: None,
            })
        );
    }

    #[tokio::test]
    async fn test_kept_archive_is_reused() {
        let fx = Fixture::new();
        fx.serve_manifest("1.0.1", &sha(&fx.archive), true);
        let installer =
            fx.installer_with(ManagerConfig::new(MANIFEST_URL).with_keep_archives(true));
        installer.install(&NullSink).await.unwrap();

        fs::write(fx.install_root().join("readme.txt"), b"edited").unwrap();
        let report = installer.verify_and_repair(&NullSink).await.unwrap();

        assert!(report.repaired);
        assert_eq!(fx.mock.request_count(ARCHIVE_URL), 1);
    }

    #[tokio::test]
    async fn test_bad_archive_aborts_repair() {
        let fx = Fixture::new();
        fx.serve_manifest("1.0.1", &sha(&fx.archive), true);
        let installer = fx.installer();
        installer.install(&NullSink).await.unwrap();
        fs::remove_file(fx.install_root().join("readme.txt")).unwrap();

        fx.mock.serve(ARCHIVE_URL, b"tampered".to_vec());
        let sink = RecordingSink::default();
        let result = installer.verify_and_repair(&sink).await;

        assert!(matches!(result, Err(ManagerError::ChecksumMismatch { .. })));
        assert!(!fx.install_root().join("readme.txt").exists());
        match sink.last() {
            Some(PipelineEvent::VerifyDone {
                ok: false,
                error: Some(error),
                ..
            }) => assert!(error.contains("Checksum mismatch")),
            other => panic!("Expected failed verify_done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrepairable_install_reports_issues() {
        let fx = Fixture::new();
        let manifest = serde_json::json!({
            "version": "1.0.1",
            "url": ARCHIVE_URL,
            "sha256": sha(&fx.archive),
            "files": [{"path": "never/shipped.bin", "sha256": sha(b"x")}],
        });
        fx.mock.serve(MANIFEST_URL, manifest.to_string());

        let report = fx.installer().verify_and_repair(&NullSink).await.unwrap();

        assert!(!report.ok);
        assert!(!report.repaired);
        assert_eq!(report.issues, 1);
        assert_eq!(report.details[0].path, "never/shipped.bin");
    }
}
