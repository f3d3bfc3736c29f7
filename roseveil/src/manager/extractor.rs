//! Zip archive extraction for patch installation.
//!
//! Entries are written beneath the destination directory, overwriting
//! existing files. Entry names that would escape the destination
//! (absolute paths, `..` components) abort the extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{ManagerError, ManagerResult};
use super::traits::{ArchiveExtractor, BoxFuture};

/// Extractor for `.zip` patch archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    /// Create a new zip extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract synchronously. Returns the number of files written.
    pub fn extract_blocking(archive_path: &Path, dest_dir: &Path) -> ManagerResult<usize> {
        let fail = |reason: String| ManagerError::ExtractionFailed {
            path: archive_path.to_path_buf(),
            reason,
        };

        let file = File::open(archive_path).map_err(|e| ManagerError::ReadFailed {
            path: archive_path.to_path_buf(),
            source: e,
        })?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| fail(format!("not a zip archive: {e}")))?;

        fs::create_dir_all(dest_dir).map_err(|e| ManagerError::CreateDirFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

        let mut written = 0;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| fail(format!("failed to read entry {i}: {e}")))?;

            let relative: PathBuf = entry
                .enclosed_name()
                .ok_or_else(|| fail(format!("unsafe entry path: {}", entry.name())))?;
            let output_path = dest_dir.join(&relative);

            if entry.is_dir() {
                create_dir(&output_path)?;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                create_dir(parent)?;
            }

            let mut outfile = File::create(&output_path).map_err(|e| ManagerError::WriteFailed {
                path: output_path.clone(),
                source: e,
            })?;
            io::copy(&mut entry, &mut outfile).map_err(|e| ManagerError::WriteFailed {
                path: output_path.clone(),
                source: e,
            })?;
            written += 1;
        }

        debug!(
            archive = %archive_path.display(),
            dest = %dest_dir.display(),
            files = written,
            "archive extracted"
        );
        Ok(written)
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn expand<'a>(
        &'a self,
        archive_path: &'a Path,
        dest_dir: &'a Path,
    ) -> BoxFuture<'a, ManagerResult<usize>> {
        let archive = archive_path.to_path_buf();
        let dest = dest_dir.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::extract_blocking(&archive, &dest))
                .await
                .map_err(|e| ManagerError::ExtractionFailed {
                    path: archive_path.to_path_buf(),
                    reason: format!("extraction task failed: {e}"),
                })?
        })
    }
}

fn create_dir(path: &Path) -> ManagerResult<()> {
    fs::create_dir_all(path).map_err(|e| ManagerError::CreateDirFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
pub mod tests {
    use std::io::Write;

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    use super::*;

    /// Write a zip archive containing `entries` (path, content).
    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_extracts_nested_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("patch.zip");
        write_zip(
            &archive,
            &[("a.txt", b"alpha"), ("sub/b.bin", b"\x00\x01\x02")],
        );

        let dest = temp.path().join("out");
        let count = ZipExtractor::new().expand(&archive, &dest).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("sub/b.bin")).unwrap(), b"\x00\x01\x02");
    }

    #[tokio::test]
    async fn test_overwrites_existing_files_and_keeps_others() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("patch.zip");
        write_zip(&archive, &[("a.txt", b"new")]);

        let dest = temp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("a.txt"), b"old contents").unwrap();
        fs::write(dest.join("keep.txt"), b"untouched").unwrap();

        ZipExtractor::new().expand(&archive, &dest).await.unwrap();

        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"new");
        assert_eq!(fs::read(dest.join("keep.txt")).unwrap(), b"untouched");
    }

    #[test]
    fn test_rejects_escaping_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", b"x")]);

        let dest = temp.path().join("out");
        let result = ZipExtractor::extract_blocking(&archive, &dest);

        assert!(matches!(result, Err(ManagerError::ExtractionFailed { .. })));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn test_not_a_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("patch.zip");
        fs::write(&archive, b"<html>not found</html>").unwrap();

        let result = ZipExtractor::extract_blocking(&archive, &temp.path().join("out"));
        assert!(matches!(result, Err(ManagerError::ExtractionFailed { .. })));
    }

    #[test]
    fn test_missing_archive() {
        let temp = TempDir::new().unwrap();
        let result =
            ZipExtractor::extract_blocking(&temp.path().join("none.zip"), &temp.path().join("out"));
        assert!(matches!(result, Err(ManagerError::ReadFailed { .. })));
    }
}
