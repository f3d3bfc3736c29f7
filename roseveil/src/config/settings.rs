//! Layered launcher settings.
//!
//! Settings are resolved once at startup and passed by reference into the
//! components that need them. Later layers override earlier ones:
//!
//! 1. built-in defaults
//! 2. `roseveil.settings.ini` next to the launcher executable (distributed)
//! 3. `<config_dir>/roseveil/roseveil.local.ini` (local override, edited by `config set`)
//!
//! Missing files are skipped. Unknown keys in a file are ignored so that a
//! newer distributed file does not break an older launcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::keys::ConfigKey;

/// File name of the distributed settings file.
pub const DISTRIBUTED_SETTINGS_FILE: &str = "roseveil.settings.ini";

/// File name of the local override file.
pub const LOCAL_SETTINGS_FILE: &str = "roseveil.local.ini";

/// Application directory name under the platform config/data dirs.
pub const APP_DIR: &str = "roseveil";

/// Launcher presentation and self-update source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSettings {
    pub title: String,
    pub update_manifest_url: String,
}

/// Game executable validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExeSettings {
    /// Required file name of the game executable.
    pub name: String,
    /// Allowed SHA-256 digests. Empty allows any build.
    pub sha256_allowlist: Vec<String>,
}

/// Patch source and install layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSettings {
    pub manifest_url: String,
    /// Install subpath below the executable's directory.
    pub dest_subdir: String,
    /// Component id written to the install record.
    pub component: String,
    /// Where archives are downloaded before extraction.
    pub staging_dir: PathBuf,
    pub keep_archives: bool,
    /// Reuse a `.part` file left by an earlier run instead of discarding it.
    pub resume_partial: bool,
}

/// Network bounds and retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub resume_attempts: u32,
}

impl NetworkSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Trusted developer switches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DevSettings {
    /// Skip archive and post-install checksum verification.
    pub skip_checksum: bool,
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub directory: PathBuf,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub launcher: LauncherSettings,
    pub exe: ExeSettings,
    pub patch: PatchSettings,
    pub network: NetworkSettings,
    pub dev: DevSettings,
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            launcher: LauncherSettings {
                title: "Rose Veil Launcher".to_string(),
                update_manifest_url: String::new(),
            },
            exe: ExeSettings {
                name: "MyGame.exe".to_string(),
                sha256_allowlist: Vec::new(),
            },
            patch: PatchSettings {
                manifest_url: String::new(),
                dest_subdir: "DLC/nsfw".to_string(),
                component: "nsfw_patch".to_string(),
                staging_dir: std::env::temp_dir().join(APP_DIR),
                keep_archives: false,
                resume_partial: false,
            },
            network: NetworkSettings {
                timeout_secs: 12,
                download_timeout_secs: 1800,
                retry_attempts: 3,
                retry_delay_ms: 500,
                resume_attempts: 3,
            },
            dev: DevSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                directory: default_log_dir(),
            },
        }
    }
}

impl Settings {
    /// Resolve settings from the standard layer locations.
    pub fn load() -> ConfigResult<Self> {
        let mut layers = Vec::new();
        if let Some(path) = distributed_settings_path() {
            layers.push(path);
        }
        if let Ok(path) = local_settings_path() {
            layers.push(path);
        }
        Self::load_layers(&layers)
    }

    /// Resolve settings from explicit files, lowest precedence first.
    pub fn load_layers(paths: &[PathBuf]) -> ConfigResult<Self> {
        let mut settings = Self::default();
        for path in paths {
            if let Some(ini) = read_ini(path)? {
                debug!(path = %path.display(), "applying settings layer");
                settings.apply_ini(&ini)?;
            }
        }
        Ok(settings)
    }

    /// Apply every known key present in `ini`.
    pub fn apply_ini(&mut self, ini: &Ini) -> ConfigResult<()> {
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(self, value)?;
            }
        }
        Ok(())
    }
}

/// Read an INI file, or `None` if it does not exist.
pub fn read_ini(path: &Path) -> ConfigResult<Option<Ini>> {
    if !path.exists() {
        return Ok(None);
    }
    Ini::load_from_file(path)
        .map(Some)
        .map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(parse) => ConfigError::Ini {
                path: path.to_path_buf(),
                reason: parse.to_string(),
            },
        })
}

/// Persist one value into an override file, keeping its other entries.
pub fn write_override(path: &Path, key: ConfigKey, value: &str) -> ConfigResult<()> {
    // Validate before touching the file.
    key.set(&mut Settings::default(), value)?;

    let mut ini = read_ini(path)?.unwrap_or_default();
    ini.with_section(Some(key.section()))
        .set(key.key_name(), value);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    ini.write_to_file(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `roseveil.settings.ini` beside the running executable.
pub fn distributed_settings_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DISTRIBUTED_SETTINGS_FILE)))
}

/// `<config_dir>/roseveil/roseveil.local.ini`.
pub fn local_settings_path() -> ConfigResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(LOCAL_SETTINGS_FILE))
        .ok_or(ConfigError::NoDirectory("config"))
}

/// `<data_dir>/roseveil`, falling back to the temp dir.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

fn default_log_dir() -> PathBuf {
    data_dir().join("logs")
}
