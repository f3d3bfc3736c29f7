//! Launcher self-update commands.

use clap::Subcommand;

use super::common::{confirm, print_json, ConsoleSink};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Version reported to the update manifest.
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Update subcommands.
#[derive(Debug, Subcommand)]
pub enum UpdateCommands {
    /// Check whether a newer launcher is published
    Check {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Download and start the latest launcher installer
    Install {
        /// Install even if the published version is not newer
        #[arg(long)]
        force: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Run an update subcommand.
pub fn run(command: UpdateCommands) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    let updater = runner.updater()?;

    match command {
        UpdateCommands::Check { json } => {
            let check = runner.block_on(updater.check(CURRENT_VERSION))?;
            if json {
                return print_json(&check);
            }
            if check.newer {
                println!("Update available: {} → {}", check.current, check.latest);
                println!("Run 'roseveil update install' to install it.");
            } else {
                println!("Launcher is up to date ({}).", check.current);
            }
            Ok(())
        }
        UpdateCommands::Install { force, yes } => {
            runner.log_startup("update install");
            runner.cancel_on_interrupt()?;

            let check = runner.block_on(updater.check(CURRENT_VERSION))?;
            if !check.newer && !force {
                println!("Launcher is up to date ({}).", check.current);
                return Ok(());
            }
            if !confirm(&format!("Install launcher {}?", check.latest), yes)? {
                println!("Cancelled.");
                return Ok(());
            }

            let sink = ConsoleSink::new();
            runner.block_on(updater.install(&check, &sink))?;
            println!("The installer is running; this launcher can be closed.");
            Ok(())
        }
    }
}
