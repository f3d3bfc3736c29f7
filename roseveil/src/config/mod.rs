//! Launcher configuration.
//!
//! - [`Settings`]: layered INI settings resolved once at startup
//! - [`ConfigKey`]: typed `section.key` names used by `config get|set|list`
//! - [`ConfigStore`]: small JSON store for state the launcher writes itself
//!   (the selected game executable)

mod error;
mod keys;
mod settings;
mod store;

pub use error::{ConfigError, ConfigResult};
pub use keys::ConfigKey;
pub use settings::{
    data_dir, distributed_settings_path, local_settings_path, read_ini, write_override,
    DevSettings, ExeSettings, LauncherSettings, LoggingSettings, NetworkSettings, PatchSettings,
    Settings, APP_DIR, DISTRIBUTED_SETTINGS_FILE, LOCAL_SETTINGS_FILE,
};
pub use store::{ConfigStore, EXE_PATH_KEY, STORE_FILE};
