//! CLI bootstrap - the composition root.
//!
//! The only place where the engine's adapters are instantiated. Handlers
//! receive a [`CliContext`] and call into the [`Engine`].

use anyhow::Result;
use sooty_core::{EngineSettings, SettingsError};
use sooty_runtime::Engine;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

const DEFAULT_FILTER: &str = "info";
const VERBOSE_FILTER: &str = "info,sooty_core=debug,sooty_runtime=debug,sooty_cli=debug";

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliConfig {
    pub verbose: bool,
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub engine: Engine,
}

impl CliContext {
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    pub const fn settings(&self) -> &EngineSettings {
        self.engine.settings()
    }
}

/// Log filter: `RUST_LOG` wins, otherwise the verbosity default.
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }))
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
fn init_logging(verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve settings from the environment (after `.env`).
pub fn load_settings() -> Result<EngineSettings, SettingsError> {
    EngineSettings::from_env()
}

/// Bootstrap the CLI application.
///
/// Loads `.env`, initialises logging, resolves settings and wires the
/// production adapters into an [`Engine`].
pub fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let dotenv = dotenvy::dotenv();
    init_logging(config.verbose);
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "loaded environment file");
    }

    let settings = load_settings().map_err(CliError::from)?;
    debug!(
        data_dir = %settings.data_dir.display(),
        game_root = %settings.game_root.display(),
        mode = %settings.supervision_mode,
        "settings resolved"
    );
    let engine = Engine::from_settings(settings).map_err(CliError::from)?;
    Ok(CliContext { engine })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults() {
        assert_eq!(log_filter(false, None).to_string(), DEFAULT_FILTER);
        assert!(log_filter(true, None).to_string().contains("sooty_runtime=debug"));
    }

    #[test]
    fn test_rust_log_overrides_verbosity() {
        assert_eq!(log_filter(true, Some("warn")).to_string(), "warn");
    }
}
