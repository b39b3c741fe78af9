//! Register, lifecycle, status and metrics handlers.

use std::path::Path;

use anyhow::Result;
use sooty_core::{LifecycleAction, ServerMetrics, ServiceStatus, Slug};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::record::load_record;

pub async fn register(ctx: &CliContext, record: &Path) -> Result<()> {
    let record = load_record(record, &ctx.settings().game_root)?;
    let unit = ctx
        .engine()
        .register(&record)
        .await
        .map_err(CliError::from)?;
    println!("unit = {}", unit.unit_name);
    println!("unit_path = {}", unit.unit_path.display());
    println!("script_path = {}", unit.script_path.display());
    Ok(())
}

pub async fn apply(ctx: &CliContext, slug: &Slug, action: LifecycleAction) -> Result<()> {
    ctx.engine()
        .lifecycle(slug, action)
        .await
        .map_err(CliError::from)?;
    println!("{slug}: {action} ok");
    Ok(())
}

fn format_status(slug: &Slug, status: &ServiceStatus) -> String {
    match (status.running, status.pid) {
        (true, Some(pid)) => format!("{slug}: running (pid {pid})"),
        (true, None) => format!("{slug}: running"),
        (false, _) => format!("{slug}: stopped"),
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_metrics(slug: &Slug, metrics: &ServerMetrics) -> String {
    match metrics.pid {
        Some(pid) if metrics.running => format!(
            "{slug}: pid {pid}, cpu {:.1}%, memory {:.1} MiB",
            metrics.cpu_percent,
            metrics.memory_bytes as f64 / (1024.0 * 1024.0)
        ),
        _ => format!("{slug}: stopped"),
    }
}

pub async fn status(ctx: &CliContext, slug: &Slug, json: bool) -> Result<()> {
    let status = ctx.engine().status(slug).await;
    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        println!("{}", format_status(slug, &status));
    }
    Ok(())
}

pub async fn metrics(ctx: &CliContext, slug: &Slug, json: bool) -> Result<()> {
    let metrics = ctx.engine().metrics(slug).await;
    if json {
        println!("{}", serde_json::to_string(&metrics)?);
    } else {
        println!("{}", format_metrics(slug, &metrics));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug() -> Slug {
        Slug::parse("alpha").unwrap()
    }

    #[test]
    fn test_format_status() {
        let running = ServiceStatus {
            running: true,
            pid: Some(4242),
        };
        assert_eq!(format_status(&slug(), &running), "alpha: running (pid 4242)");
        assert_eq!(
            format_status(&slug(), &ServiceStatus::default()),
            "alpha: stopped"
        );
    }

    #[test]
    fn test_format_metrics() {
        let metrics = ServerMetrics {
            running: true,
            pid: Some(7),
            cpu_percent: 12.3,
            memory_bytes: 3 * 1024 * 1024,
        };
        assert_eq!(
            format_metrics(&slug(), &metrics),
            "alpha: pid 7, cpu 12.3%, memory 3.0 MiB"
        );
        assert_eq!(
            format_metrics(&slug(), &ServerMetrics::stopped()),
            "alpha: stopped"
        );
    }
}
