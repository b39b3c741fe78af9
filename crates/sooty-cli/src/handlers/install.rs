//! Install command handler.
//!
//! Starts an install in the background and follows its event stream until
//! the terminal event. Interrupting the CLI abandons the install.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use sooty_core::InstallEvent;
use tokio_stream::StreamExt;

use crate::bootstrap::CliContext;
use crate::commands::PlanArgs;
use crate::error::CliError;
use crate::handlers::record::{build_plan, load_record};

/// One-line summary of a successful install payload.
fn summarize(payload: &Value) -> String {
    let field = |key: &str| payload.get(key).and_then(Value::as_str).unwrap_or("-");
    format!(
        "{} installed in {} as {} ({})",
        field("slug"),
        field("base_dir"),
        field("service_name"),
        field("version"),
    )
}

fn failure_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_owned()
}

/// Print `event`, returning the outcome once the stream ends.
fn print_event(
    out: &mut impl Write,
    event: &InstallEvent,
    json: bool,
) -> Result<Option<Result<(), CliError>>> {
    if json {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    match event {
        InstallEvent::Line { line } => {
            if !json {
                writeln!(out, "{line}")?;
            }
            Ok(None)
        }
        InstallEvent::Done { ok: true, payload } => {
            if !json {
                writeln!(out, "{}", summarize(payload))?;
            }
            Ok(Some(Ok(())))
        }
        InstallEvent::Done { ok: false, payload } => {
            Ok(Some(Err(CliError::InstallFailed(failure_message(payload)))))
        }
    }
}

pub async fn execute(ctx: &CliContext, record: &Path, plan: &PlanArgs, json: bool) -> Result<()> {
    let record = load_record(record, &ctx.settings().game_root)?;
    let plan = build_plan(&record, plan)?;
    let stream_id = ctx
        .engine()
        .start_install(record, plan)
        .map_err(CliError::from)?;
    eprintln!("stream: {stream_id}");

    let Some(mut events) = ctx.engine().subscribe(&stream_id) else {
        anyhow::bail!("install stream {stream_id} disappeared before it could be followed");
    };

    let mut stdout = std::io::stdout();
    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => return Err(CliError::Interrupted.into()),
        };
        let Some(event) = event else {
            anyhow::bail!("install stream {stream_id} closed without an outcome");
        };
        if let Some(outcome) = print_event(&mut stdout, &event, json)? {
            stdout.flush()?;
            return outcome.map_err(Into::into);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lines_print_verbatim() {
        let mut out = Vec::new();
        let outcome = print_event(&mut out, &InstallEvent::line("[installer] hi"), false).unwrap();
        assert!(outcome.is_none());
        assert_eq!(String::from_utf8(out).unwrap(), "[installer] hi\n");
    }

    #[test]
    fn test_success_prints_summary() {
        let mut out = Vec::new();
        let event = InstallEvent::done(
            true,
            json!({
                "slug": "alpha",
                "base_dir": "/srv/alpha",
                "service_name": "sootypage-alpha.service",
                "version": "1.21.1 build 7",
            }),
        );
        let outcome = print_event(&mut out, &event, false).unwrap();
        assert!(matches!(outcome, Some(Ok(()))));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "alpha installed in /srv/alpha as sootypage-alpha.service (1.21.1 build 7)\n"
        );
    }

    #[test]
    fn test_failure_becomes_install_error() {
        let mut out = Vec::new();
        let event = InstallEvent::done(
            false,
            json!({"message": "steamcmd missing", "step": "dependencies"}),
        );
        let outcome = print_event(&mut out, &event, true).unwrap();
        let Some(Err(CliError::InstallFailed(message))) = outcome else {
            panic!("expected a failure outcome");
        };
        assert_eq!(message, "steamcmd missing");
        assert!(String::from_utf8(out).unwrap().starts_with(r#"{"type":"done","ok":false"#));
    }
}
