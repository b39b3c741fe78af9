//! Operating-system adapters for the sooty game-server engine.
//!
//! Implements the ports defined in `sooty-core`: child processes through
//! tokio, HTTP downloads through reqwest, services through systemd, process
//! sampling through sysinfo and remote consoles over Source RCON. The
//! [`Engine`] ties them together behind the operations the request layer
//! needs.

#![deny(unsafe_code)]

pub mod command;
pub mod engine;
pub mod install;
pub mod monitor;
pub mod rcon;
pub mod streams;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use command::SystemCommandRunner;
pub use engine::{Engine, EngineError, EnginePorts, INSTALL_DONE_LINE, stream_id};
pub use install::{HttpArtifactFetcher, InstallerPipeline};
pub use monitor::SysinfoMonitor;
pub use rcon::{TcpRconClient, parse_player_count, query_player_count};
pub use streams::{InstallEventStream, InstallStreamRegistry, StreamHandle};
pub use supervisor::{RootUnitBackend, SystemdSupervisor, UnitBackend, UserUnitBackend};

// Re-export so callers can drive the sweeper without a direct dependency.
pub use tokio_util::sync::CancellationToken;
