//! Domain types for game servers, install plans and service units.
//!
//! These are pure data types with deterministic rendering helpers. They
//! perform no I/O.

mod install;
mod launch;
mod server;
mod unit;

pub use install::{
    DEFAULT_MOTD, InstallPlan, ManagedRuntimePlan, NativeBinaryPlan, RUST_DEDICATED_APP_ID,
    RUST_DEDICATED_EXECUTABLE, RuntimeFlavor, RuntimeOptions, UMOD_RUST_URL, VersionSelector,
};
pub use launch::{DEFAULT_LAUNCH_RAM_MB, DEFAULT_RUST_DESCRIPTION, render_launch_script};
pub use server::{
    DEFAULT_MINECRAFT_PORT, DEFAULT_RUST_PORT, DEFAULT_RUST_QUERY_PORT, DEFAULT_RUST_RCON_PORT,
    GameKind, RCON_PASSWORD_MIN_LEN, RconEndpoint, RecordError, SLUG_MAX_LEN, ServerRecord, Slug,
    SlugError, is_plain_file_name,
};
pub use unit::{
    DEFAULT_RESTART_SEC, DEFAULT_UNIT_PREFIX, RestartPolicy, UnitError, UnitSpec, unit_name,
};
