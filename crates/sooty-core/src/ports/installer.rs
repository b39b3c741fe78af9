//! Installer port and the install error taxonomy.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CommandError, FetchError, LineCallback};
use crate::domain::{InstallPlan, RecordError};

/// Pipeline stage an install failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStep {
    Preflight,
    Dependencies,
    Metadata,
    Fetch,
    Provision,
    Verify,
    Overlay,
    Configure,
}

impl InstallStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Dependencies => "dependencies",
            Self::Metadata => "metadata",
            Self::Fetch => "fetch",
            Self::Provision => "provision",
            Self::Verify => "verify",
            Self::Overlay => "overlay",
            Self::Configure => "configure",
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by an install.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Target directory could not be made writable.
    #[error("Install directory {} is not writable: {reason}. {hint}", .path.display())]
    NotWritable {
        path: PathBuf,
        reason: String,
        hint: String,
    },

    /// The plan would write outside the target directory.
    #[error("Invalid install plan: {0}")]
    InvalidPlan(#[from] RecordError),

    /// A required tool is missing and could not be installed.
    #[error("{name} is not available. {hint}")]
    MissingDependency { name: String, hint: String },

    /// An external command failed during `step`.
    #[error("{step} step failed: {source}")]
    Command {
        step: InstallStep,
        #[source]
        source: CommandError,
    },

    /// A metadata lookup or download failed during `step`.
    #[error("{step} step failed: {source}")]
    Fetch {
        step: InstallStep,
        #[source]
        source: FetchError,
    },

    /// Metadata was reachable but did not contain what was needed.
    #[error("Could not resolve {what}: {reason}")]
    Metadata { what: String, reason: String },

    /// The expected artifact is missing after provisioning.
    #[error(
        "{expected} not found under {} after install. Directory contains: {}",
        .dir.display(),
        .listing.join(", ")
    )]
    VerificationFailed {
        expected: String,
        dir: PathBuf,
        listing: Vec<String>,
    },

    /// Another install already targets this directory.
    #[error("An install into {} is already in progress", .path.display())]
    AlreadyInProgress { path: PathBuf },

    #[error("Install did not finish within {}s", .after.as_secs())]
    TimedOut { after: Duration },

    #[error("{step} step failed on {}: {source}", .path.display())]
    Io {
        step: InstallStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub const fn command(step: InstallStep, source: CommandError) -> Self {
        Self::Command { step, source }
    }

    pub const fn fetch(step: InstallStep, source: FetchError) -> Self {
        Self::Fetch { step, source }
    }

    pub fn io(step: InstallStep, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            step,
            path: path.into(),
            source,
        }
    }

    /// Stage the failure belongs to.
    pub const fn step(&self) -> InstallStep {
        match self {
            Self::NotWritable { .. } | Self::AlreadyInProgress { .. } | Self::InvalidPlan(_) => {
                InstallStep::Preflight
            }
            Self::MissingDependency { .. } => InstallStep::Dependencies,
            Self::Command { step, .. } | Self::Fetch { step, .. } | Self::Io { step, .. } => *step,
            Self::Metadata { .. } => InstallStep::Metadata,
            Self::VerificationFailed { .. } => InstallStep::Verify,
            Self::TimedOut { .. } => InstallStep::Provision,
        }
    }
}

/// Summary of a finished install.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallReport {
    pub target: PathBuf,
    /// Resolved version for managed runtimes.
    pub version: Option<String>,
    /// Verified executable for native binaries.
    pub executable: Option<PathBuf>,
    /// Files written by the installer (config, scripts).
    pub generated: Vec<PathBuf>,
}

/// Provisions a server into a directory.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Run `plan` into `target`, reporting progress through `on_line`.
    async fn install(
        &self,
        plan: &InstallPlan,
        target: &Path,
        on_line: LineCallback,
    ) -> Result<InstallReport, InstallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_writable_message_includes_hint() {
        let err = InstallError::NotWritable {
            path: PathBuf::from("/srv/rust/alpha"),
            reason: "permission denied".to_owned(),
            hint: "Set GAME_ROOT to a writable directory.".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/srv/rust/alpha"));
        assert!(msg.contains("GAME_ROOT"));
        assert_eq!(err.step(), InstallStep::Preflight);
    }

    #[test]
    fn test_step_of_wrapped_errors() {
        let err = InstallError::command(
            InstallStep::Provision,
            CommandError::failed("steamcmd", Some(8), String::new()),
        );
        assert_eq!(err.step(), InstallStep::Provision);
        assert_eq!(err.to_string(), "provision step failed: `steamcmd` exited 8");
    }

    #[test]
    fn test_verification_lists_entries() {
        let err = InstallError::VerificationFailed {
            expected: "RustDedicated".to_owned(),
            dir: PathBuf::from("/srv/x"),
            listing: vec!["steamapps".to_owned(), "linux64".to_owned()],
        };
        assert!(err.to_string().ends_with("steamapps, linux64"));
    }
}
