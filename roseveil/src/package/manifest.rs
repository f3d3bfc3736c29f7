//! Manifest documents describing one installable archive.

use serde::{Deserialize, Deserializer, Serialize};

/// One file the archive is expected to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the install root.
    pub path: String,
    /// Expected SHA-256 of the installed file.
    pub sha256: String,
}

/// Remote descriptor of a patch or launcher update.
///
/// ```text
/// { "version": "1.0.1",
///   "url": "https://cdn.example.com/patch_1.0.1.zip",
///   "sha256": "…",            // optional
///   "files": [ { "path": "…", "sha256": "…" } ]   // optional
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Dotted-numeric version.
    pub version: String,
    /// Location of the archive or installer.
    pub url: String,
    /// Expected digest of the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Files to check after extraction. Empty means no post-install check.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<ManifestFile>,
}

/// `"files": null` reads the same as an absent list.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ManifestFile>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ManifestFile>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    /// Whether the manifest declares a per-file list for verification.
    pub fn has_file_list(&self) -> bool {
        !self.files.is_empty()
    }

    /// The declared archive digest, if present and non-blank.
    pub fn archive_digest(&self) -> Option<&str> {
        self.sha256
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// File name of the archive (last URL path segment, without query).
    pub fn archive_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("archive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::parse_tolerant;

    #[test]
    fn test_full_manifest() {
        let manifest: Manifest = parse_tolerant(
            r#"{
                "version": "1.0.1",
                "url": "https://cdn.example.com/patch_1.0.1.zip?sig=abc",
                "sha256": "AA11",
                "files": [{"path": "data/a.pak", "sha256": "bb22"}]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.version, "1.0.1");
        assert_eq!(manifest.archive_digest(), Some("AA11"));
        assert!(manifest.has_file_list());
        assert_eq!(manifest.files[0].path, "data/a.pak");
        assert_eq!(manifest.archive_name(), "patch_1.0.1.zip");
    }

    #[test]
    fn test_optional_fields_default() {
        let manifest: Manifest =
            parse_tolerant(r#"{"version":"2","url":"https://x.example/u.bin"}"#).unwrap();
        assert_eq!(manifest.sha256, None);
        assert!(manifest.files.is_empty());
        assert!(!manifest.has_file_list());
    }

    #[test]
    fn test_blank_digest_is_absent() {
        let manifest = Manifest {
            version: "1".into(),
            url: "https://x.example/".into(),
            sha256: Some("  ".into()),
            files: Vec::new(),
        };
        assert_eq!(manifest.archive_digest(), None);
        assert_eq!(manifest.archive_name(), "x.example");
    }

    #[test]
    fn test_missing_version_is_an_error() {
        let result = parse_tolerant::<Manifest>(r#"{"url":"https://x.example/a.zip"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_null_file_list_is_empty() {
        let manifest: Manifest = parse_tolerant(
            r#"{"version":"1.0.1","url":"u","sha256":"aa","files":null}"#,
        )
        .unwrap();

        assert!(manifest.files.is_empty());
        assert!(!manifest.has_file_list());
        assert_eq!(manifest.archive_digest(), Some("aa"));
    }
}
