//! Persistent key/value store for launcher state.
//!
//! A small JSON object in `<data_dir>/roseveil/config.json`. `set` merges
//! the given keys into the stored object (shallow) and writes it back.
//! The selected game executable lives under [`EXE_PATH_KEY`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::warn;

use super::error::{ConfigError, ConfigResult};
use super::settings::data_dir;

/// File name of the store.
pub const STORE_FILE: &str = "config.json";

/// Key holding the selected executable path.
pub const EXE_PATH_KEY: &str = "exePath";

/// JSON-backed config store.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    // Serializes read-merge-write cycles within the process.
    lock: Mutex<()>,
}

impl ConfigStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at the default location.
    pub fn open_default() -> Self {
        Self::new(data_dir().join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole stored object. A missing or corrupt file reads as empty.
    pub fn load(&self) -> Map<String, Value> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "config store is not a JSON object, treating as empty");
                Map::new()
            }
        }
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.load().get(key).cloned()
    }

    /// String value of `key`; non-strings and missing keys read as `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Merge `patch` into the stored object and persist it.
    ///
    /// Returns the merged object.
    pub fn set(&self, patch: Map<String, Value>) -> ConfigResult<Map<String, Value>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut merged = self.load();
        merged.extend(patch);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(&merged).map_err(|e| ConfigError::Json {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| ConfigError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ConfigError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(merged)
    }

    /// Path of the selected executable.
    pub fn exe_path(&self) -> Option<PathBuf> {
        self.get_str(EXE_PATH_KEY).map(PathBuf::from)
    }

    /// Record the selected executable.
    pub fn set_exe_path(&self, path: &Path) -> ConfigResult<()> {
        let mut patch = Map::new();
        patch.insert(
            EXE_PATH_KEY.to_string(),
            Value::String(path.display().to_string()),
        );
        self.set(patch).map(|_| ())
    }
}
