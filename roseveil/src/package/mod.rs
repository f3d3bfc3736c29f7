//! Manifest, version and install-record types.
//!
//! # Overview
//!
//! - **Manifest**: remote descriptor of one archive (version, url, digest, file list)
//! - **Tolerant parse**: JSON parsing that survives BOMs and wrapping noise
//! - **Version**: dotted-numeric comparison used by the badge and self-update
//! - **Install record**: `installed.json`, written when an install completes
//!
//! # File Formats
//!
//! ```text
//! manifest.json                       installed.json
//! ├── version: "1.0.1"                ├── component: "nsfw_patch"
//! ├── url: "https://…/patch.zip"      ├── version: "1.0.1"
//! ├── sha256: "…" (optional)          └── installedAt: "2024-05-01T10:00:00.000Z"
//! └── files: [{path, sha256}] (optional)
//! ```

mod installed;
mod manifest;
mod parse;
mod version;

pub use installed::{InstallRecord, INSTALL_RECORD_FILE};
pub use manifest::{Manifest, ManifestFile};
pub use parse::{extract_json_span, parse_tolerant, parse_tolerant_bytes, JsonParseError};
pub use version::{compare_versions, is_newer};
