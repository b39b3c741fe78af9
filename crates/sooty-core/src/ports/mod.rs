//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the engine expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No process, socket or HTTP types in any signature
//! - External programs are described as argument vectors, never shell strings
//! - Every trait is `Send + Sync` so adapters can be shared behind `Arc`

pub mod artifact_fetcher;
pub mod command_runner;
pub mod installer;
pub mod rcon;
pub mod resource_monitor;
pub mod supervisor;

pub use artifact_fetcher::{ArtifactFetcher, FetchError};
pub use command_runner::{
    CommandError, CommandOutput, CommandRunner, CommandSpec, LineCallback, noop_line_callback,
};
pub use installer::{InstallError, InstallReport, InstallStep, Installer};
pub use rcon::{PlayerCount, RconClient, RconError};
pub use resource_monitor::{MonitorError, ResourceMonitor, ResourceSample, ServerMetrics};
pub use supervisor::{
    LifecycleAction, RegisteredUnit, ServiceStatus, ServiceSupervisor, SupervisorError,
};
