//! Subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use sooty_core::{Slug, SlugError};

fn parse_slug(value: &str) -> Result<Slug, SlugError> {
    Slug::parse(value)
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show resolved settings and directories
    Paths,

    /// Install a server and register its unit, following progress
    Install {
        /// Server record (JSON)
        #[arg(long)]
        record: PathBuf,
        #[command(flatten)]
        plan: PlanArgs,
        /// Print raw install events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Write the launch script and unit for an installed server
    Register {
        /// Server record (JSON)
        #[arg(long)]
        record: PathBuf,
    },

    /// Start a server
    Start {
        #[arg(value_parser = parse_slug)]
        slug: Slug,
    },

    /// Stop a server
    Stop {
        #[arg(value_parser = parse_slug)]
        slug: Slug,
    },

    /// Stop then start a server
    Restart {
        #[arg(value_parser = parse_slug)]
        slug: Slug,
    },

    /// Show whether a server is running and its main pid
    Status {
        #[arg(value_parser = parse_slug)]
        slug: Slug,
        #[arg(long)]
        json: bool,
    },

    /// Sample CPU and memory of a running server
    Metrics {
        #[arg(value_parser = parse_slug)]
        slug: Slug,
        #[arg(long)]
        json: bool,
    },

    /// Send one console command over RCON
    Rcon {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long, env = "SOOTY_RCON_PASSWORD", hide_env_values = true)]
        password: String,
        /// Override the configured RCON deadline
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Command and arguments, joined with spaces
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Query the player count of a server through its RCON endpoint
    Players {
        /// Server record (JSON) with an `rcon` endpoint
        #[arg(long)]
        record: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

/// Managed runtime distribution for Minecraft servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuntimeArg {
    Paper,
    Fabric,
    Forge,
}

/// How the server should be provisioned.
#[derive(Debug, Clone, Default, Args)]
pub struct PlanArgs {
    /// Minecraft runtime (default: paper)
    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeArg>,
    /// Minecraft version, or "latest"
    #[arg(long = "mc-version")]
    pub mc_version: Option<String>,
    /// Fabric loader version
    #[arg(long)]
    pub loader: Option<String>,
    /// Fabric installer version
    #[arg(long = "fabric-installer")]
    pub fabric_installer: Option<String>,
    /// Forge build
    #[arg(long = "forge-build")]
    pub forge_build: Option<String>,
    /// Install the uMod (Oxide) overlay on a Rust server
    #[arg(long)]
    pub umod: bool,
    /// JVM heap size
    #[arg(long)]
    pub ram_mb: Option<u32>,
    /// Message of the day for Minecraft servers
    #[arg(long)]
    pub motd: Option<String>,
}
