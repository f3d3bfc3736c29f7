//! CLI error type.

use std::fmt;

use roseveil::config::ConfigError;
use roseveil::manager::ManagerError;

/// Errors surfaced to the user by a command.
#[derive(Debug)]
pub enum CliError {
    /// Bad arguments or settings.
    Config(String),
    /// Settings or config store failure.
    Settings(ConfigError),
    /// Install, repair, update or launch failure.
    Manager(ManagerError),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
    /// Interactive prompt failure.
    Prompt(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Settings(e) => write!(f, "{}", e),
            CliError::Manager(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Settings(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Settings(_) => 2,
            CliError::Manager(ManagerError::Busy(_)) => 3,
            _ => 1,
        }
    }
}
