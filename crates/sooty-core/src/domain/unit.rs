//! Service unit descriptors.

use std::fmt::{self, Write as _};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::server::{ServerRecord, Slug};

/// Prefix used for unit names when none is configured.
pub const DEFAULT_UNIT_PREFIX: &str = "sootypage";

/// Seconds systemd waits before restarting a failed server.
pub const DEFAULT_RESTART_SEC: u32 = 5;

/// Build the unit name for a server: `<prefix>-<slug>.service`.
pub fn unit_name(prefix: &str, slug: &Slug) -> String {
    format!("{prefix}-{slug}.service")
}

/// A field that cannot be written into a unit file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("Unit field {field} contains a control character: {value:?}")]
    ControlCharacter { field: &'static str, value: String },
}

/// When the supervisor restarts a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    #[default]
    OnFailure,
    Always,
}

impl RestartPolicy {
    pub const fn as_systemd(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::OnFailure => "on-failure",
            Self::Always => "always",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_systemd())
    }
}

/// Everything needed to render a unit descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub description: String,
    pub working_dir: PathBuf,
    pub exec_start: PathBuf,
    pub restart: RestartPolicy,
    pub restart_sec: u32,
    pub memory_max_mib: Option<u64>,
    /// Console output is appended here when set.
    pub log_file: Option<PathBuf>,
    pub wanted_by: String,
}

impl UnitSpec {
    /// Unit for a server record whose launch script lives at `script`.
    pub fn for_server(
        record: &ServerRecord,
        prefix: &str,
        script: impl Into<PathBuf>,
        wanted_by: impl Into<String>,
    ) -> Self {
        Self {
            name: unit_name(prefix, &record.slug),
            description: format!(
                "Sootypage {} Server ({})",
                record.game.display_name(),
                record.display_name()
            ),
            working_dir: record.base_dir.clone(),
            exec_start: script.into(),
            restart: RestartPolicy::OnFailure,
            restart_sec: DEFAULT_RESTART_SEC,
            memory_max_mib: record.memory_limit_mib,
            log_file: Some(record.base_dir.join("logs").join("console.log")),
            wanted_by: wanted_by.into(),
        }
    }

    /// Render the unit file. Output is deterministic and uses LF endings.
    ///
    /// Control characters in names or paths would start new directives, so
    /// they are refused rather than escaped.
    pub fn render(&self) -> Result<String, UnitError> {
        let working_dir = unit_value("WorkingDirectory", &self.working_dir.to_string_lossy())?;
        let exec_start = unit_value("ExecStart", &self.exec_start.to_string_lossy())?;
        let log = match &self.log_file {
            Some(path) => Some(unit_value("StandardOutput", &path.to_string_lossy())?),
            None => None,
        };
        let wanted_by = unit_value("WantedBy", &self.wanted_by)?;

        let mut out = String::new();
        out.push_str("[Unit]\n");
        let _ = writeln!(out, "Description={}", single_line(&self.description));
        out.push_str("After=network.target\n\n");

        out.push_str("[Service]\n");
        out.push_str("Type=simple\n");
        let _ = writeln!(out, "WorkingDirectory={}", escape_specifiers(&working_dir));
        let _ = writeln!(out, "ExecStart={}", quote_exec(&exec_start));
        let _ = writeln!(out, "Restart={}", self.restart);
        let _ = writeln!(out, "RestartSec={}", self.restart_sec);
        if let Some(limit) = self.memory_max_mib {
            let _ = writeln!(out, "MemoryMax={limit}M");
        }
        if let Some(log) = log {
            let log = escape_specifiers(&log);
            let _ = writeln!(out, "StandardOutput=append:{log}");
            let _ = writeln!(out, "StandardError=append:{log}");
        }
        out.push('\n');

        out.push_str("[Install]\n");
        let _ = writeln!(out, "WantedBy={wanted_by}");
        Ok(out)
    }
}

fn unit_value(field: &'static str, value: &str) -> Result<String, UnitError> {
    if value.chars().any(char::is_control) {
        return Err(UnitError::ControlCharacter {
            field,
            value: value.to_owned(),
        });
    }
    Ok(value.to_owned())
}

fn single_line(value: &str) -> String {
    escape_specifiers(&value.replace(['\r', '\n'], " "))
}

/// `%` introduces a systemd specifier.
fn escape_specifiers(value: &str) -> String {
    value.replace('%', "%%")
}

fn quote_exec(path: &str) -> String {
    let escaped = escape_specifiers(path);
    if escaped.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        let inner = escaped.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{inner}\"")
    } else {
        escaped
    }
}
