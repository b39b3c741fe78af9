//! Paths command handler.
//!
//! Prints resolved settings and directories in `key = value` form.

use sooty_core::{EngineSettings, SupervisionMode};

/// Render the resolved settings, one `key = value` per line.
pub fn render(settings: &EngineSettings, user_unit_dir: Option<&std::path::Path>) -> String {
    let unit_dir = match settings.supervision_mode {
        SupervisionMode::Root => sooty_core::paths::ROOT_UNIT_DIR.to_owned(),
        SupervisionMode::User => user_unit_dir.map_or_else(
            || "<unresolved>".to_owned(),
            |dir| dir.display().to_string(),
        ),
    };
    let install_timeout = settings
        .install_timeout_secs
        .map_or_else(|| "disabled".to_owned(), |s| format!("{s}s"));

    [
        ("data_dir", settings.data_dir.display().to_string()),
        ("game_root", settings.game_root.display().to_string()),
        ("scripts_dir", settings.scripts_dir().display().to_string()),
        ("downloads_dir", settings.downloads_dir().display().to_string()),
        ("install_logs_dir", settings.install_logs_dir().display().to_string()),
        ("supervision_mode", settings.supervision_mode.to_string()),
        ("unit_dir", unit_dir),
        ("unit_prefix", settings.unit_prefix.clone()),
        ("steamcmd", settings.steamcmd_path.display().to_string()),
        ("install_timeout", install_timeout),
    ]
    .iter()
    .map(|(key, value)| format!("{key} = {value}\n"))
    .collect()
}

pub fn execute(settings: &EngineSettings) {
    let user_unit_dir = sooty_core::paths::user_unit_dir().ok();
    print!("{}", render(settings, user_unit_dir.as_deref()));
}
