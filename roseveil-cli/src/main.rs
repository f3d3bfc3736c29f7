//! Rose Veil launcher CLI.
//!
//! Command-line shell over the `roseveil` library: patch install, verify and
//! repair, enable/disable, launcher self-update and game launch.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::exe::ExeCommands;
use commands::patch::PatchCommands;
use commands::update::UpdateCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "roseveil", version, about = "Rose Veil game launcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install, verify and manage the game patch
    Patch {
        #[command(subcommand)]
        command: PatchCommands,
    },

    /// Check for and install launcher updates
    Update {
        #[command(subcommand)]
        command: UpdateCommands,
    },

    /// Show or set the game executable
    Exe {
        #[command(subcommand)]
        command: ExeCommands,
    },

    /// Start the game
    Launch,

    /// View or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Create the local settings file
    Init,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Patch { command } => commands::patch::run(command),
        Commands::Update { command } => commands::update::run(command),
        Commands::Exe { command } => commands::exe::run(command),
        Commands::Launch => commands::exe::run_launch(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Init => commands::init::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
