//! CLI error types and exit codes.

use std::path::PathBuf;

use sooty_core::SettingsError;
use sooty_runtime::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    #[error("Cannot read server record {}: {reason}", .path.display())]
    Record { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] SettingsError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The install stream ended with `ok: false`.
    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Interrupted")]
    Interrupted,
}

impl CliError {
    /// Exit code following sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Record { .. } => 66, // EX_NOINPUT
            Self::Config(_) => 78,     // EX_CONFIG
            Self::Engine(_) | Self::InstallFailed(_) => 1,
            Self::Interrupted => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::InstallFailed("x".into()).exit_code(), 1);
        assert_eq!(
            CliError::Config(SettingsError::InvalidMode("x".into())).exit_code(),
            78
        );
    }
}
