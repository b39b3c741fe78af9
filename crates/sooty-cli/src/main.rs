//! CLI entry point.
//!
//! Parses arguments, composes the engine through [`bootstrap`] and routes
//! each subcommand to its handler.

use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use sooty_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};
use sooty_core::{LifecycleAction, RconEndpoint};

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(CliConfig {
        verbose: cli.verbose,
    })?;

    match command {
        Commands::Paths => handlers::paths::execute(ctx.settings()),
        Commands::Install { record, plan, json } => {
            handlers::install::execute(&ctx, &record, &plan, json).await?;
        }
        Commands::Register { record } => handlers::lifecycle::register(&ctx, &record).await?,
        Commands::Start { slug } => {
            handlers::lifecycle::apply(&ctx, &slug, LifecycleAction::Start).await?;
        }
        Commands::Stop { slug } => {
            handlers::lifecycle::apply(&ctx, &slug, LifecycleAction::Stop).await?;
        }
        Commands::Restart { slug } => {
            handlers::lifecycle::apply(&ctx, &slug, LifecycleAction::Restart).await?;
        }
        Commands::Status { slug, json } => handlers::lifecycle::status(&ctx, &slug, json).await?,
        Commands::Metrics { slug, json } => {
            handlers::lifecycle::metrics(&ctx, &slug, json).await?;
        }
        Commands::Rcon {
            host,
            port,
            password,
            timeout_ms,
            command,
        } => {
            let endpoint = RconEndpoint::new(host, port, password);
            let timeout = timeout_ms.map(Duration::from_millis);
            handlers::rcon::command(&ctx, &endpoint, &command, timeout).await?;
        }
        Commands::Players { record, json } => handlers::rcon::players(&ctx, &record, json).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
