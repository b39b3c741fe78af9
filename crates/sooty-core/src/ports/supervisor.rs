//! Service supervisor port.
//!
//! Servers run as supervised services so they survive the engine process.
//! Lifecycle operations address a server by slug; implementations map the
//! slug to their own unit naming.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CommandError;
use crate::domain::{ServerRecord, Slug, UnitError};

/// Lifecycle operations exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            other => Err(format!("unknown lifecycle action: {other}")),
        }
    }
}

/// Live state of a supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

/// Artifacts written while registering a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUnit {
    pub unit_name: String,
    pub unit_path: PathBuf,
    pub script_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A step of unit registration failed; nothing is enabled.
    #[error("Failed to register {unit} ({step}): {source}")]
    Registration {
        unit: String,
        step: &'static str,
        #[source]
        source: CommandError,
    },

    /// A lifecycle command failed.
    #[error("Failed to {action} {unit}: {source}")]
    Operation {
        unit: String,
        action: LifecycleAction,
        #[source]
        source: CommandError,
    },

    /// The record cannot be rendered into a unit file.
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Registers and drives supervised services.
#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    /// Write the launch script and unit descriptor, reload the supervisor and
    /// enable the unit.
    ///
    /// Registration is idempotent; re-registering overwrites prior artifacts.
    async fn register(&self, record: &ServerRecord) -> Result<RegisteredUnit, SupervisorError>;

    async fn start(&self, slug: &Slug) -> Result<(), SupervisorError>;

    async fn stop(&self, slug: &Slug) -> Result<(), SupervisorError>;

    /// Stop then start. Succeeds when the unit was already stopped.
    async fn restart(&self, slug: &Slug) -> Result<(), SupervisorError> {
        self.stop(slug).await?;
        self.start(slug).await
    }

    /// Whether the unit is active. Query failures read as not running.
    async fn is_running(&self, slug: &Slug) -> bool;

    /// Main process id, or `None` when the unit has no process.
    async fn main_pid(&self, slug: &Slug) -> Option<u32>;

    async fn status(&self, slug: &Slug) -> ServiceStatus {
        let running = self.is_running(slug).await;
        let pid = if running { self.main_pid(slug).await } else { None };
        ServiceStatus { running, pid }
    }

    /// Apply a lifecycle action.
    async fn apply(&self, slug: &Slug, action: LifecycleAction) -> Result<(), SupervisorError> {
        match action {
            LifecycleAction::Start => self.start(slug).await,
            LifecycleAction::Stop => self.stop(slug).await,
            LifecycleAction::Restart => self.restart(slug).await,
        }
    }
}
