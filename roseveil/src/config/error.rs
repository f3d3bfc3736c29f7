//! Error types for settings and the config store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem failure on a config file.
    #[error("config I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    /// An INI settings file could not be parsed.
    #[error("failed to parse settings file {}: {reason}", .path.display())]
    Ini { path: PathBuf, reason: String },

    /// The JSON config store could not be parsed or encoded.
    #[error("invalid config store {}: {reason}", .path.display())]
    Json { path: PathBuf, reason: String },

    /// A setting has a value of the wrong shape.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A `section.key` name that no setting uses.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    /// The platform has no config or data directory.
    #[error("could not determine the {0} directory")]
    NoDirectory(&'static str),
}
