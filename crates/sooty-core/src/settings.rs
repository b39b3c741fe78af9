//! Engine settings and validation.
//!
//! Settings are read from environment variables. Parsing goes through a
//! lookup function so callers (and tests) decide where values come from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DEFAULT_UNIT_PREFIX;
use crate::paths::{self, PathError};

/// Default delay before a completed install stream is discarded.
pub const DEFAULT_STREAM_RETENTION_SECS: u64 = 600;

/// Default absolute age ceiling for install streams.
pub const DEFAULT_STREAM_MAX_AGE_SECS: u64 = 3600;

/// Default period of the stream sweep timer.
pub const DEFAULT_STREAM_SWEEP_SECS: u64 = 900;

/// Default RCON deadline.
pub const DEFAULT_RCON_TIMEOUT_MS: u64 = 3000;

/// Default install wall-clock ceiling.
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 7200;

/// Default steamcmd location on Debian-family hosts.
pub const DEFAULT_STEAMCMD_PATH: &str = "/usr/games/steamcmd";

/// Privilege level of the process supervisor backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisionMode {
    /// Per-user units driven with `systemctl --user`.
    #[default]
    User,
    /// System units installed and driven through non-interactive sudo.
    Root,
}

impl FromStr for SupervisionMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "" => Ok(Self::User),
            "root" | "system" => Ok(Self::Root),
            other => Err(SettingsError::InvalidMode(other.to_owned())),
        }
    }
}

impl fmt::Display for SupervisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Root => f.write_str("root"),
        }
    }
}

/// Errors that can occur while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid SYSTEMD_MODE {0:?}: expected \"user\" or \"root\"")]
    InvalidMode(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    ZeroDuration { key: &'static str },

    #[error("Stream retention ({retention}s) cannot exceed the maximum stream age ({max_age}s)")]
    RetentionExceedsMaxAge { retention: u64, max_age: u64 },

    #[error("Invalid unit prefix {0:?}: only [A-Za-z0-9_-] are allowed")]
    InvalidUnitPrefix(String),

    #[error("Game root must be an absolute path: {}", .0.display())]
    RelativeGameRoot(PathBuf),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Resolved engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub data_dir: PathBuf,
    pub game_root: PathBuf,
    pub supervision_mode: SupervisionMode,
    pub unit_prefix: String,
    pub steamcmd_path: PathBuf,
    pub stream_retention_secs: u64,
    pub stream_max_age_secs: u64,
    pub stream_sweep_secs: u64,
    pub rcon_timeout_ms: u64,
    /// `None` disables the install ceiling.
    pub install_timeout_secs: Option<u64>,
}

impl EngineSettings {
    /// Settings rooted at `data_dir` with every other value defaulted.
    pub fn with_defaults(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            game_root: paths::default_game_root(&data_dir),
            data_dir,
            supervision_mode: SupervisionMode::User,
            unit_prefix: DEFAULT_UNIT_PREFIX.to_owned(),
            steamcmd_path: PathBuf::from(DEFAULT_STEAMCMD_PATH),
            stream_retention_secs: DEFAULT_STREAM_RETENTION_SECS,
            stream_max_age_secs: DEFAULT_STREAM_MAX_AGE_SECS,
            stream_sweep_secs: DEFAULT_STREAM_SWEEP_SECS,
            rcon_timeout_ms: DEFAULT_RCON_TIMEOUT_MS,
            install_timeout_secs: Some(DEFAULT_INSTALL_TIMEOUT_SECS),
        }
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = paths::data_root_from(lookup(paths::DATA_DIR_ENV).as_deref())?;
        let mut settings = Self::with_defaults(data_dir);

        if let Some(root) = lookup("GAME_ROOT").filter(|v| !v.trim().is_empty()) {
            settings.game_root = PathBuf::from(root.trim());
        }
        if let Some(mode) = lookup("SYSTEMD_MODE") {
            settings.supervision_mode = mode.parse()?;
        }
        if let Some(prefix) = lookup("SOOTY_UNIT_PREFIX").filter(|v| !v.trim().is_empty()) {
            settings.unit_prefix = prefix.trim().to_owned();
        }
        if let Some(path) = lookup("STEAMCMD_PATH").filter(|v| !v.trim().is_empty()) {
            settings.steamcmd_path = PathBuf::from(path.trim());
        }

        let number = |key: &'static str| -> Result<Option<u64>, SettingsError> {
            lookup(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|_| SettingsError::InvalidNumber { key, value: raw })
                })
                .transpose()
        };

        if let Some(v) = number("SOOTY_STREAM_RETENTION_SECS")? {
            settings.stream_retention_secs = v;
        }
        if let Some(v) = number("SOOTY_STREAM_MAX_AGE_SECS")? {
            settings.stream_max_age_secs = v;
        }
        if let Some(v) = number("SOOTY_STREAM_SWEEP_SECS")? {
            settings.stream_sweep_secs = v;
        }
        if let Some(v) = number("SOOTY_RCON_TIMEOUT_MS")? {
            settings.rcon_timeout_ms = v;
        }
        if let Some(v) = number("SOOTY_INSTALL_TIMEOUT_SECS")? {
            settings.install_timeout_secs = (v > 0).then_some(v);
        }

        validate_settings(&settings)?;
        Ok(settings)
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: SupervisionMode) -> Self {
        self.supervision_mode = mode;
        self
    }

    #[must_use]
    pub fn with_game_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.game_root = root.into();
        self
    }

    pub const fn stream_retention(&self) -> Duration {
        Duration::from_secs(self.stream_retention_secs)
    }

    pub const fn stream_max_age(&self) -> Duration {
        Duration::from_secs(self.stream_max_age_secs)
    }

    pub const fn stream_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.stream_sweep_secs)
    }

    pub const fn rcon_timeout(&self) -> Duration {
        Duration::from_millis(self.rcon_timeout_ms)
    }

    pub fn install_timeout(&self) -> Option<Duration> {
        self.install_timeout_secs.map(Duration::from_secs)
    }

    /// Default install directory for a server slug.
    pub fn server_dir(&self, slug: &str) -> PathBuf {
        self.game_root.join(slug)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        paths::scripts_dir(&self.data_dir)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        paths::downloads_dir(&self.data_dir)
    }

    pub fn install_logs_dir(&self) -> PathBuf {
        paths::install_logs_dir(&self.data_dir)
    }

    pub fn staging_dir(&self) -> PathBuf {
        paths::staging_dir(&self.data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Validate settings values.
pub fn validate_settings(settings: &EngineSettings) -> Result<(), SettingsError> {
    if settings.stream_sweep_secs == 0 {
        return Err(SettingsError::ZeroDuration {
            key: "SOOTY_STREAM_SWEEP_SECS",
        });
    }
    if settings.stream_max_age_secs == 0 {
        return Err(SettingsError::ZeroDuration {
            key: "SOOTY_STREAM_MAX_AGE_SECS",
        });
    }
    if settings.rcon_timeout_ms == 0 {
        return Err(SettingsError::ZeroDuration {
            key: "SOOTY_RCON_TIMEOUT_MS",
        });
    }
    if settings.stream_retention_secs > settings.stream_max_age_secs {
        return Err(SettingsError::RetentionExceedsMaxAge {
            retention: settings.stream_retention_secs,
            max_age: settings.stream_max_age_secs,
        });
    }
    if settings.unit_prefix.is_empty()
        || !settings
            .unit_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(SettingsError::InvalidUnitPrefix(settings.unit_prefix.clone()));
    }
    if !settings.game_root.is_absolute() {
        return Err(SettingsError::RelativeGameRoot(settings.game_root.clone()));
    }
    Ok(())
}
