//! Command handlers.
//!
//! Handlers are thin: read CLI input, call the [`Engine`](sooty_runtime::Engine)
//! through [`CliContext`](crate::CliContext), format the result.

pub mod install;
pub mod lifecycle;
pub mod paths;
pub mod rcon;
pub mod record;
