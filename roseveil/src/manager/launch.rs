//! Detached process launching for the game and the update installer.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use super::error::{ManagerError, ManagerResult};
use super::executable::ExecutableResolver;
use super::traits::ProcessLauncher;

/// Starts programs with no inherited stdio, in their own directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl DetachedLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for DetachedLauncher {
    fn spawn_detached(&self, program: &Path, args: &[String]) -> ManagerResult<()> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            command.creation_flags(DETACHED_PROCESS);
        }

        // The child is not waited on; dropping the handle leaves it running.
        let child = command.spawn().map_err(|e| ManagerError::LaunchFailed {
            path: program.to_path_buf(),
            source: e,
        })?;
        info!(program = %program.display(), pid = child.id(), "process started");
        Ok(())
    }
}

/// Validate the configured game executable and start it.
///
/// Never prompts: launching without a valid executable is a configuration error.
pub async fn launch_game(
    resolver: &ExecutableResolver,
    launcher: &dyn ProcessLauncher,
) -> ManagerResult<PathBuf> {
    let exe = resolver.current().await?;
    launcher.spawn_detached(&exe, &[])?;
    Ok(exe)
}
