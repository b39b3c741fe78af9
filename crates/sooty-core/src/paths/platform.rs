//! Engine directory layout.
//!
//! Everything the engine writes outside server directories lives under a
//! single data root:
//!
//! ```text
//! <data_root>/
//!   scripts/     launch scripts, one per server
//!   downloads/   installer and overlay archives
//!   install-logs/
//!   staging/     unit files waiting to be copied into place
//! ```

use std::env;
use std::path::{Path, PathBuf};

use super::error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "SOOTY_DATA_DIR";

/// Directory for system-wide units when supervising as root.
pub const ROOT_UNIT_DIR: &str = "/etc/systemd/system";

const APP_DIR_NAME: &str = "sootypage";

/// Get the root directory for engine data.
///
/// Resolution order:
/// 1. `SOOTY_DATA_DIR` environment variable (highest priority)
/// 2. System data directory (e.g., `~/.local/share/sootypage`)
pub fn data_root() -> Result<PathBuf, PathError> {
    data_root_from(env::var(DATA_DIR_ENV).ok().as_deref())
}

/// Resolve the data root from an explicit override.
pub fn data_root_from(override_dir: Option<&str>) -> Result<PathBuf, PathError> {
    match override_dir.map(str::trim) {
        Some("") => Err(PathError::EmptyPath),
        Some(dir) => Ok(PathBuf::from(dir)),
        None => {
            let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
            Ok(data_dir.join(APP_DIR_NAME))
        }
    }
}

/// Launch scripts directory.
pub fn scripts_dir(data_root: &Path) -> PathBuf {
    data_root.join("scripts")
}

/// Downloaded installers and archives.
pub fn downloads_dir(data_root: &Path) -> PathBuf {
    data_root.join("downloads")
}

/// Per-install log files.
pub fn install_logs_dir(data_root: &Path) -> PathBuf {
    data_root.join("install-logs")
}

/// Unit files written here before a privileged copy.
pub fn staging_dir(data_root: &Path) -> PathBuf {
    data_root.join("staging")
}

/// Default parent directory for server installs.
pub fn default_game_root(data_root: &Path) -> PathBuf {
    data_root.join("servers")
}

/// Directory for per-user systemd units (`~/.config/systemd/user`).
pub fn user_unit_dir() -> Result<PathBuf, PathError> {
    let config = dirs::config_dir().ok_or(PathError::NoConfigDir)?;
    Ok(config.join("systemd").join("user"))
}

/// The invoking user's home directory.
pub fn home_dir() -> Result<PathBuf, PathError> {
    dirs::home_dir().ok_or(PathError::NoHomeDir)
}
