//! Init command - create the local settings file.

use std::path::Path;

use roseveil::config::{local_settings_path, write_override, ConfigKey, ConfigStore, Settings};

use crate::error::CliError;

/// Run the init command.
pub fn run() -> Result<(), CliError> {
    let path = local_settings_path()?;

    if path.exists() {
        println!("Settings file already exists:");
        println!("  {}", path.display());
    } else {
        let settings = Settings::load()?;
        let written = write_defaults(&path, &settings)?;
        println!("Created settings file with {} entries:", written);
        println!("  {}", path.display());
    }
    println!();

    if ConfigStore::open_default().exe_path().is_none() {
        println!("No game executable selected yet.");
        println!("Run 'roseveil exe set <path>' or let 'roseveil patch install' ask for it.");
        println!();
    }

    println!("Edit the settings file or use 'roseveil config set' to change values.");
    println!("Values here override the settings shipped next to the launcher.");
    Ok(())
}

/// Write every non-empty resolved value into the file at `path`.
fn write_defaults(path: &Path, settings: &Settings) -> Result<usize, CliError> {
    let mut written = 0;
    for key in ConfigKey::all() {
        let value = key.get(settings);
        if value.is_empty() {
            continue;
        }
        write_override(path, *key, &value)?;
        written += 1;
    }
    Ok(written)
}
