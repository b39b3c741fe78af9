//! Launch script rendering.
//!
//! Every value interpolated into a script passes through
//! [`shell_words::quote`], so record fields can never break out of their
//! argument position.

use std::borrow::Cow;
use std::fmt::Write as _;

use super::install::RUST_DEDICATED_EXECUTABLE;
use super::server::{
    DEFAULT_RUST_QUERY_PORT, DEFAULT_RUST_RCON_PORT, GameKind, ServerRecord,
};

/// Default heap size when a Minecraft record does not carry one.
pub const DEFAULT_LAUNCH_RAM_MB: u32 = 2048;

/// Default server description advertised by Rust servers.
pub const DEFAULT_RUST_DESCRIPTION: &str = "Hosted with Sootypage Game Panel";

fn quote(value: &str) -> Cow<'_, str> {
    shell_words::quote(value)
}

/// Render the script the supervisor executes to run a server.
///
/// Output is deterministic for a given record.
pub fn render_launch_script(record: &ServerRecord) -> String {
    let mut script = String::from("#!/usr/bin/env bash\nset -euo pipefail\n");
    let base_dir = record.base_dir.to_string_lossy();
    let _ = writeln!(script, "cd {}", quote(&base_dir));

    match record.game {
        GameKind::Rust => render_rust(&mut script, record),
        GameKind::Minecraft => render_minecraft(&mut script, record),
    }
    script
}

fn render_rust(script: &mut String, record: &ServerRecord) {
    let slug = record.slug.as_str();
    let query_port = record.query_port.unwrap_or(DEFAULT_RUST_QUERY_PORT);
    let level = record.level.as_deref().unwrap_or("Procedural Map");
    let description = record
        .description
        .as_deref()
        .unwrap_or(DEFAULT_RUST_DESCRIPTION);

    let mut args: Vec<(&str, String)> = vec![
        ("+server.identity", slug.to_owned()),
        ("+server.port", record.port.to_string()),
        ("+server.queryport", query_port.to_string()),
        ("+server.level", level.to_owned()),
        ("+server.seed", record.seed.unwrap_or(0).to_string()),
        (
            "+server.worldsize",
            record.world_size.unwrap_or(3500).to_string(),
        ),
        ("+server.maxplayers", record.max_players.to_string()),
    ];

    match &record.rcon {
        Some(rcon) => {
            args.push(("+rcon.web", "1".to_owned()));
            args.push(("+rcon.ip", rcon.host.clone()));
            args.push(("+rcon.port", rcon.port.to_string()));
            args.push(("+rcon.password", rcon.password.clone()));
        }
        None => {
            args.push(("+rcon.web", "1".to_owned()));
            args.push(("+rcon.ip", "127.0.0.1".to_owned()));
            args.push(("+rcon.port", DEFAULT_RUST_RCON_PORT.to_string()));
        }
    }
    args.push(("+server.hostname", record.display_name().to_owned()));
    args.push(("+server.description", description.to_owned()));

    let _ = write!(
        script,
        "exec ./{RUST_DEDICATED_EXECUTABLE} -batchmode -nographics"
    );
    for (flag, value) in &args {
        let _ = write!(script, " \\\n  {flag} {}", quote(value));
    }
    script.push('\n');
}

fn render_minecraft(script: &mut String, record: &ServerRecord) {
    let ram = record.ram_mb.unwrap_or(DEFAULT_LAUNCH_RAM_MB);
    let jar = record.jar_name.as_deref().unwrap_or("server.jar");

    script.push_str("if [ -f ./start.sh ]; then\n  exec bash ./start.sh\nfi\n");
    script.push_str("if [ -f ./run.sh ]; then\n  exec bash ./run.sh\nfi\n");
    let _ = writeln!(script, "JAR={}", quote(jar));
    script.push_str("if [ ! -f \"$JAR\" ]; then\n");
    script.push_str("  JAR=\"$(ls -1 ./*.jar 2>/dev/null | head -n 1 || true)\"\n");
    script.push_str("fi\n");
    script.push_str("if [ -z \"$JAR\" ]; then\n");
    script.push_str("  echo \"No server jar found in $(pwd)\" >&2\n  exit 1\nfi\n");
    let _ = writeln!(
        script,
        "exec java -Xms{ram}M -Xmx{ram}M -jar \"$JAR\" nogui"
    );
}
