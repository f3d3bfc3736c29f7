//! Capability traits the patch manager depends on.
//!
//! The install pipeline only talks to the outside world through these
//! interfaces, so every collaborator can be swapped for a test double.
//! Async methods return [`BoxFuture`] to keep the traits dyn-compatible
//! (`Arc<dyn ArchiveExtractor>` and friends).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use super::error::ManagerResult;
use super::executable::ExecutableValidator;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Expands an archive into a destination directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive_path` into `dest_dir`, creating the directory if absent.
    ///
    /// Existing files are overwritten. Returns the number of files written.
    fn expand<'a>(
        &'a self,
        archive_path: &'a Path,
        dest_dir: &'a Path,
    ) -> BoxFuture<'a, ManagerResult<usize>>;
}

/// Locates the game executable when none is configured.
///
/// Implementations typically ask the user (file dialog, prompt). The
/// validator must accept the returned path; selectors should loop or fail
/// rather than return something the validator rejects.
pub trait ExecutableSelector: Send + Sync {
    /// Return a path accepted by `validator`, or an error if the user gave up.
    fn select<'a>(
        &'a self,
        validator: &'a ExecutableValidator,
    ) -> BoxFuture<'a, ManagerResult<PathBuf>>;
}

/// Starts an external program detached from the launcher.
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `program` with `args` and return without waiting for it.
    fn spawn_detached(&self, program: &Path, args: &[String]) -> ManagerResult<()>;
}
