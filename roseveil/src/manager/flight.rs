//! Single-flight guards for mutating operations.
//!
//! Only one install-like flow (patch install, repair, self-update) may run at
//! a time, and the install root may not be extracted into while it is being
//! renamed or deleted. Each rule is a [`FlightKey`]; acquiring a key that is
//! already held fails with [`ManagerError::Busy`] instead of waiting.
//!
//! Within a process keys are tracked in a map. With a lock directory each key
//! also takes an exclusive OS lock on `<lock_dir>/<key>.lock`, so separate
//! launcher processes exclude each other too. The lock is released when the
//! guard drops or the process exits.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fs4::FileExt;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::error::{ManagerError, ManagerResult};

/// File name of the global pipeline lock.
pub const PIPELINE_LOCK_FILE: &str = "pipeline.lock";

/// What a guard protects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlightKey {
    /// The global install/update slot.
    Pipeline,
    /// A specific install root directory.
    InstallRoot(PathBuf),
}

impl FlightKey {
    pub fn install_root(path: &Path) -> Self {
        Self::InstallRoot(path.to_path_buf())
    }

    /// Lock file name for this key inside a lock directory.
    pub fn lock_file_name(&self) -> String {
        match self {
            Self::Pipeline => PIPELINE_LOCK_FILE.to_string(),
            Self::InstallRoot(path) => {
                let digest = Sha256::digest(path.to_string_lossy().as_bytes());
                let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
                format!("root-{hex}.lock")
            }
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => f.write_str("install pipeline"),
            Self::InstallRoot(path) => write!(f, "install root {}", path.display()),
        }
    }
}

/// Registry of held keys. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    held: Arc<DashMap<FlightKey, &'static str>>,
    lock_dir: Option<PathBuf>,
}

impl SingleFlight {
    /// In-process guards only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Guards that also hold OS file locks under `dir`.
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            held: Arc::default(),
            lock_dir: Some(dir.into()),
        }
    }

    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    /// Take `key` for `operation`, or fail if someone else holds it.
    pub fn acquire(&self, key: FlightKey, operation: &'static str) -> ManagerResult<FlightGuard> {
        match self.held.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(%key, holder = *existing.get(), operation, "single-flight rejected");
                Err(ManagerError::Busy(key.to_string()))
            }
            Entry::Vacant(slot) => {
                let lock = match &self.lock_dir {
                    Some(dir) => Some(lock_file(dir, &key, operation)?),
                    None => None,
                };
                slot.insert(operation);
                Ok(FlightGuard {
                    held: Arc::clone(&self.held),
                    key,
                    lock,
                })
            }
        }
    }

    /// Whether `key` is currently held by this process.
    pub fn is_held(&self, key: &FlightKey) -> bool {
        self.held.contains_key(key)
    }
}

/// Open and exclusively lock the file for `key`; contention is `Busy`.
fn lock_file(dir: &Path, key: &FlightKey, operation: &'static str) -> ManagerResult<File> {
    fs::create_dir_all(dir).map_err(|source| ManagerError::CreateDirFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(key.lock_file_name());
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| ManagerError::WriteFailed {
            path: path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(err) if is_contended(&err) => {
            debug!(%key, operation, lock = %path.display(), "lock held by another process");
            Err(ManagerError::Busy(key.to_string()))
        }
        Err(source) => Err(ManagerError::WriteFailed { path, source }),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct FlightGuard {
    held: Arc<DashMap<FlightKey, &'static str>>,
    key: FlightKey,
    lock: Option<File>,
}

impl FlightGuard {
    pub fn key(&self) -> &FlightKey {
        &self.key
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.lock {
            let _ = FileExt::unlock(file);
        }
        self.held.remove(&self.key);
    }
}
