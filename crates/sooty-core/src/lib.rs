//! Core domain types and port definitions for the sooty game-server engine.
//!
//! This crate holds everything that does not touch the operating system:
//! server records and slugs, install plans, launch-script and unit rendering,
//! install events, engine settings, and the port traits implemented by
//! `sooty-runtime`.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    GameKind, InstallPlan, ManagedRuntimePlan, NativeBinaryPlan, RconEndpoint, RecordError,
    RestartPolicy, RuntimeFlavor, RuntimeOptions, ServerRecord, Slug, SlugError, UnitError, UnitSpec,
    VersionSelector, render_launch_script, unit_name,
};
pub use events::InstallEvent;
pub use ports::{
    ArtifactFetcher, CommandError, CommandOutput, CommandRunner, CommandSpec, FetchError,
    InstallError, InstallReport, InstallStep, Installer, LifecycleAction, LineCallback,
    MonitorError, PlayerCount, RconClient, RconError, RegisteredUnit, ResourceMonitor,
    ResourceSample, ServerMetrics, ServiceStatus, ServiceSupervisor, SupervisorError,
    noop_line_callback,
};
pub use settings::{EngineSettings, SettingsError, SupervisionMode, validate_settings};

// Re-export path utilities
pub use paths::{PathError, data_root, ensure_directory, verify_writable};
