//! Game executable commands and game launch.

use std::path::PathBuf;

use clap::Subcommand;

use roseveil::manager::{launch_game, DetachedLauncher};

use super::common::print_json;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Executable subcommands.
#[derive(Debug, Subcommand)]
pub enum ExeCommands {
    /// Show the configured game executable and whether it is valid
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the game executable
    Set {
        /// Path to the game executable
        path: PathBuf,
    },
}

/// Run an exe subcommand.
pub fn run(command: ExeCommands) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    let resolver = runner.resolver(false);

    match command {
        ExeCommands::Status { json } => {
            let status = runner.block_on(resolver.status());
            if json {
                return print_json(&status);
            }
            if status.exe_path.is_empty() {
                println!("Game executable: (not set)");
            } else {
                println!("Game executable: {}", status.exe_path);
            }
            match &status.reason {
                None => println!("Status:          valid"),
                Some(reason) => println!("Status:          invalid ({})", reason),
            }
            Ok(())
        }
        ExeCommands::Set { path } => {
            let path = std::path::absolute(&path).unwrap_or(path);
            runner.block_on(resolver.select(&path))?;
            println!("Game executable set to {}", path.display());
            Ok(())
        }
    }
}

/// Start the game.
pub fn run_launch() -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("launch");
    let resolver = runner.resolver(false);

    let exe = runner.block_on(launch_game(&resolver, &DetachedLauncher::new()))?;
    println!("Started {}", exe.display());
    Ok(())
}
