//! Patch CLI commands: install, verify, status, enable, disable, uninstall.

use clap::Subcommand;
use console::style;

use roseveil::manager::PatchState;

use super::common::{confirm, format_bytes, print_json, ConsoleSink};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Patch subcommands.
#[derive(Debug, Subcommand)]
pub enum PatchCommands {
    /// Download, verify and install the latest patch
    Install,

    /// Verify installed files and repair them if needed
    Verify,

    /// Show installed and latest patch versions
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-enable a disabled patch
    Enable,

    /// Disable the patch without deleting it
    Disable,

    /// Delete the patch
    Uninstall {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Run a patch subcommand.
pub fn run(command: PatchCommands) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    match command {
        PatchCommands::Install => run_install(&runner),
        PatchCommands::Verify => run_verify(&runner),
        PatchCommands::Status { json } => run_status(&runner, json),
        PatchCommands::Enable => run_toggle(&runner, true),
        PatchCommands::Disable => run_toggle(&runner, false),
        PatchCommands::Uninstall { yes } => run_uninstall(&runner, yes),
    }
}

fn run_install(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("patch install");
    runner.cancel_on_interrupt()?;
    let installer = runner.installer(true)?;
    let sink = ConsoleSink::new();

    let report = runner.block_on(installer.install(&sink))?;

    println!();
    println!("Version:   {}", report.version);
    println!("Location:  {}", report.install_root.display());
    println!(
        "Archive:   {} ({} files)",
        format_bytes(report.archive_bytes),
        report.files_extracted
    );
    if report.checksum_skipped {
        println!(
            "{}",
            style("Warning: checksums were NOT verified (dev.skip_checksum)").yellow()
        );
    }
    Ok(())
}

fn run_verify(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("patch verify");
    runner.cancel_on_interrupt()?;
    let installer = runner.installer(true)?;
    let sink = ConsoleSink::new();

    let report = runner.block_on(installer.verify_and_repair(&sink))?;
    if !report.ok {
        for issue in &report.details {
            println!("  {} ({})", issue.path, issue.reason);
        }
        return Err(CliError::Config(format!(
            "{} file(s) could not be repaired",
            report.issues
        )));
    }
    Ok(())
}

fn run_status(runner: &CliRunner, json: bool) -> Result<(), CliError> {
    let installer = runner.installer(false)?;
    let (versions, state) = runner.block_on(async {
        let versions = installer.versions().await;
        let state = installer.state().await.ok();
        (versions, state)
    });

    if json {
        return print_json(&serde_json::json!({
            "versions": versions,
            "state": state,
        }));
    }

    println!("Patch Status");
    println!("============");
    println!(
        "Latest:    {}",
        versions.manifest_version.as_deref().unwrap_or("(unavailable)")
    );
    println!(
        "Installed: {}",
        versions.installed_version.as_deref().unwrap_or("(none)")
    );
    println!("State:     {}", state_label(state));
    println!("Badge:     {}", versions.badge);
    if let Some(error) = &versions.manifest_error {
        println!();
        println!("Manifest error: {}", error);
    }
    Ok(())
}

fn run_toggle(runner: &CliRunner, enable: bool) -> Result<(), CliError> {
    runner.log_startup(if enable { "patch enable" } else { "patch disable" });
    let installer = runner.installer(false)?;
    let state = runner.block_on(async {
        if enable {
            installer.enable().await
        } else {
            installer.disable().await
        }
    })?;
    println!("Patch is now {}", state_label(Some(state)));
    Ok(())
}

fn run_uninstall(runner: &CliRunner, yes: bool) -> Result<(), CliError> {
    runner.log_startup("patch uninstall");
    let installer = runner.installer(false)?;

    if !confirm("Delete the installed patch?", yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    match runner.block_on(installer.uninstall())? {
        Some(path) => println!("Removed {}", path.display()),
        None => println!("Patch is not installed."),
    }
    Ok(())
}

fn state_label(state: Option<PatchState>) -> &'static str {
    match state {
        Some(PatchState::Enabled) => "enabled",
        Some(PatchState::Disabled) => "disabled",
        Some(PatchState::NotInstalled) => "not installed",
        None => "unknown (game executable not set)",
    }
}
