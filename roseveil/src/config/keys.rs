//! Typed names for every setting.
//!
//! `ConfigKey` maps a `section.key` string onto a field of [`Settings`],
//! with parsing and validation on `set`.

use std::path::PathBuf;
use std::str::FromStr;

use super::error::{ConfigError, ConfigResult};
use super::settings::Settings;

/// A known setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    LauncherTitle,
    LauncherUpdateManifestUrl,
    ExeName,
    ExeSha256Allowlist,
    PatchManifestUrl,
    PatchDestSubdir,
    PatchComponent,
    PatchStagingDir,
    PatchKeepArchives,
    PatchResumePartial,
    NetworkTimeoutSecs,
    NetworkDownloadTimeoutSecs,
    NetworkRetryAttempts,
    NetworkRetryDelayMs,
    NetworkResumeAttempts,
    DevSkipChecksum,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::LauncherTitle,
            Self::LauncherUpdateManifestUrl,
            Self::ExeName,
            Self::ExeSha256Allowlist,
            Self::PatchManifestUrl,
            Self::PatchDestSubdir,
            Self::PatchComponent,
            Self::PatchStagingDir,
            Self::PatchKeepArchives,
            Self::PatchResumePartial,
            Self::NetworkTimeoutSecs,
            Self::NetworkDownloadTimeoutSecs,
            Self::NetworkRetryAttempts,
            Self::NetworkRetryDelayMs,
            Self::NetworkResumeAttempts,
            Self::DevSkipChecksum,
            Self::LoggingLevel,
            Self::LoggingDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LauncherTitle => "launcher.title",
            Self::LauncherUpdateManifestUrl => "launcher.update_manifest_url",
            Self::ExeName => "exe.name",
            Self::ExeSha256Allowlist => "exe.sha256_allowlist",
            Self::PatchManifestUrl => "patch.manifest_url",
            Self::PatchDestSubdir => "patch.dest_subdir",
            Self::PatchComponent => "patch.component",
            Self::PatchStagingDir => "patch.staging_dir",
            Self::PatchKeepArchives => "patch.keep_archives",
            Self::PatchResumePartial => "patch.resume_partial",
            Self::NetworkTimeoutSecs => "network.timeout_secs",
            Self::NetworkDownloadTimeoutSecs => "network.download_timeout_secs",
            Self::NetworkRetryAttempts => "network.retry_attempts",
            Self::NetworkRetryDelayMs => "network.retry_delay_ms",
            Self::NetworkResumeAttempts => "network.resume_attempts",
            Self::DevSkipChecksum => "dev.skip_checksum",
            Self::LoggingLevel => "logging.level",
            Self::LoggingDirectory => "logging.directory",
        }
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key within the section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or(("", name))
    }

    /// Current value rendered as a string.
    pub fn get(&self, settings: &Settings) -> String {
        match self {
            Self::LauncherTitle => settings.launcher.title.clone(),
            Self::LauncherUpdateManifestUrl => settings.launcher.update_manifest_url.clone(),
            Self::ExeName => settings.exe.name.clone(),
            Self::ExeSha256Allowlist => settings.exe.sha256_allowlist.join(","),
            Self::PatchManifestUrl => settings.patch.manifest_url.clone(),
            Self::PatchDestSubdir => settings.patch.dest_subdir.clone(),
            Self::PatchComponent => settings.patch.component.clone(),
            Self::PatchStagingDir => settings.patch.staging_dir.display().to_string(),
            Self::PatchKeepArchives => settings.patch.keep_archives.to_string(),
            Self::PatchResumePartial => settings.patch.resume_partial.to_string(),
            Self::NetworkTimeoutSecs => settings.network.timeout_secs.to_string(),
            Self::NetworkDownloadTimeoutSecs => settings.network.download_timeout_secs.to_string(),
            Self::NetworkRetryAttempts => settings.network.retry_attempts.to_string(),
            Self::NetworkRetryDelayMs => settings.network.retry_delay_ms.to_string(),
            Self::NetworkResumeAttempts => settings.network.resume_attempts.to_string(),
            Self::DevSkipChecksum => settings.dev.skip_checksum.to_string(),
            Self::LoggingLevel => settings.logging.level.clone(),
            Self::LoggingDirectory => settings.logging.directory.display().to_string(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, settings: &mut Settings, value: &str) -> ConfigResult<()> {
        let value = value.trim();
        match self {
            Self::LauncherTitle => settings.launcher.title = value.to_string(),
            Self::LauncherUpdateManifestUrl => {
                settings.launcher.update_manifest_url = self.url(value)?
            }
            Self::ExeName => settings.exe.name = self.non_empty(value)?,
            Self::ExeSha256Allowlist => settings.exe.sha256_allowlist = self.digest_list(value)?,
            Self::PatchManifestUrl => settings.patch.manifest_url = self.url(value)?,
            Self::PatchDestSubdir => settings.patch.dest_subdir = self.non_empty(value)?,
            Self::PatchComponent => settings.patch.component = self.non_empty(value)?,
            Self::PatchStagingDir => {
                settings.patch.staging_dir = PathBuf::from(self.non_empty(value)?)
            }
            Self::PatchKeepArchives => settings.patch.keep_archives = self.boolean(value)?,
            Self::PatchResumePartial => settings.patch.resume_partial = self.boolean(value)?,
            Self::NetworkTimeoutSecs => settings.network.timeout_secs = self.positive(value)?,
            Self::NetworkDownloadTimeoutSecs => {
                settings.network.download_timeout_secs = self.positive(value)?
            }
            Self::NetworkRetryAttempts => {
                settings.network.retry_attempts = self.positive(value)? as u32
            }
            Self::NetworkRetryDelayMs => settings.network.retry_delay_ms = self.number(value)?,
            Self::NetworkResumeAttempts => {
                settings.network.resume_attempts = self.positive(value)? as u32
            }
            Self::DevSkipChecksum => settings.dev.skip_checksum = self.boolean(value)?,
            Self::LoggingLevel => settings.logging.level = self.non_empty(value)?,
            Self::LoggingDirectory => {
                settings.logging.directory = PathBuf::from(self.non_empty(value)?)
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn non_empty(&self, value: &str) -> ConfigResult<String> {
        if value.is_empty() {
            return Err(self.invalid(value, "must not be empty"));
        }
        Ok(value.to_string())
    }

    fn url(&self, value: &str) -> ConfigResult<String> {
        if value.is_empty() || value.starts_with("http://") || value.starts_with("https://") {
            Ok(value.to_string())
        } else {
            Err(self.invalid(value, "expected an http(s) URL"))
        }
    }

    fn boolean(&self, value: &str) -> ConfigResult<bool> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn number(&self, value: &str) -> ConfigResult<u64> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected an unsigned integer"))
    }

    fn positive(&self, value: &str) -> ConfigResult<u64> {
        match self.number(value)? {
            0 => Err(self.invalid(value, "must be at least 1")),
            n if n > u32::MAX as u64 => Err(self.invalid(value, "value is too large")),
            n => Ok(n),
        }
    }

    fn digest_list(&self, value: &str) -> ConfigResult<Vec<String>> {
        value
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                if d.len() == 64 && d.chars().all(|c| c.is_ascii_hexdigit()) {
                    Ok(d.to_ascii_lowercase())
                } else {
                    Err(self.invalid(d, "expected a 64-character hex SHA-256"))
                }
            })
            .collect()
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownKey(wanted.to_string()))
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
