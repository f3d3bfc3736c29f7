//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path`.
//! Values are read from the resolved settings; `set` writes the local
//! override file, which takes precedence over the distributed settings.

use std::path::Path;

use clap::Subcommand;
use roseveil::config::{
    distributed_settings_path, local_settings_path, write_override, ConfigKey, ConfigStore,
    Settings,
};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., patch.manifest_url)
        key: String,
    },

    /// Set a configuration value in the local override file
    Set {
        /// Configuration key in format section.key (e.g., patch.manifest_url)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file paths
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => {
            let path = local_settings_path()?;
            run_set(&path, &key, &value)
        }
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'roseveil config list' to see available keys.",
            key
        ))
    })
}

/// Get a configuration value.
fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let settings = Settings::load()?;
    let value = config_key.get(&settings);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value in the override file at `path`.
fn run_set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    write_override(path, config_key, value)?;

    println!("Set {} = {}", config_key.name(), value);
    Ok(())
}

/// List all configuration settings.
fn run_list() -> Result<(), CliError> {
    let settings = Settings::load()?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&settings);
        let key_name = key.key_name();

        if value.is_empty() {
            println!("  {} = (not set)", key_name);
        } else {
            println!("  {} = {}", key_name, value);
        }
    }

    Ok(())
}

/// Show the configuration file paths.
fn run_path() -> Result<(), CliError> {
    match distributed_settings_path() {
        Some(path) => println!("Distributed: {}", path.display()),
        None => println!("Distributed: (unknown)"),
    }
    println!("Local:       {}", local_settings_path()?.display());
    println!("State:       {}", ConfigStore::open_default().path().display());
    Ok(())
}
