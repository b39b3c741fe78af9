//! RCON command and player-count handlers.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use sooty_core::{PlayerCount, RconEndpoint};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::record::load_record;

pub async fn command(
    ctx: &CliContext,
    endpoint: &RconEndpoint,
    words: &[String],
    timeout: Option<Duration>,
) -> Result<()> {
    let command = words.join(" ");
    let timeout = timeout.unwrap_or_else(|| ctx.settings().rcon_timeout());
    let reply = ctx
        .engine()
        .rcon_command_with_timeout(endpoint, &command, timeout)
        .await
        .map_err(CliError::from)?;
    println!("{}", reply.trim_end());
    Ok(())
}

fn format_count(count: PlayerCount) -> String {
    match (count.online, count.max) {
        (Some(online), Some(max)) => format!("{online}/{max} players online"),
        (Some(online), None) => format!("{online} players online"),
        _ => "player count unavailable".to_owned(),
    }
}

pub async fn players(ctx: &CliContext, record: &Path, json: bool) -> Result<()> {
    let record = load_record(record, &ctx.settings().game_root)?;
    let count = ctx
        .engine()
        .player_count(&record)
        .await
        .map_err(CliError::from)?;
    if json {
        println!("{}", serde_json::to_string(&count)?);
    } else {
        println!("{}: {}", record.slug, format_count(count));
    }
    Ok(())
}
