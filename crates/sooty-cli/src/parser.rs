//! Root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Install, supervise and query dedicated game servers on this host.
#[derive(Parser)]
#[command(name = "sooty")]
#[command(about = "Install, supervise and query dedicated game servers")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
