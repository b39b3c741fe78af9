//! Command-line front end for the sooty game-server engine.
//!
//! `main.rs` parses arguments and dispatches; everything it needs lives here
//! so handlers can be tested without spawning the binary.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, PlanArgs, RuntimeArg};
pub use error::CliError;
pub use parser::Cli;
