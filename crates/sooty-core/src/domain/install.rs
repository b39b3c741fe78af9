//! Install plans.
//!
//! An [`InstallPlan`] describes what should end up in a target directory;
//! the runtime installer decides how to get it there.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::server::{RecordError, is_plain_file_name};

/// Steam application id of the Rust dedicated server.
pub const RUST_DEDICATED_APP_ID: u32 = 258_550;

/// Executable the Rust dedicated server install must produce.
pub const RUST_DEDICATED_EXECUTABLE: &str = "RustDedicated";

/// Download location of the uMod (Oxide) overlay for Rust.
pub const UMOD_RUST_URL: &str = "https://umod.org/games/rust/download";

/// Default message of the day for new Minecraft servers.
pub const DEFAULT_MOTD: &str = "Sootypage Game Panel";

/// Which version of an artifact to install.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VersionSelector {
    /// Resolve the newest release at install time.
    #[default]
    Latest,
    /// Install exactly this version.
    Pinned(String),
}

impl VersionSelector {
    pub fn pinned(&self) -> Option<&str> {
        match self {
            Self::Latest => None,
            Self::Pinned(v) => Some(v),
        }
    }
}

impl From<String> for VersionSelector {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Pinned(trimmed.to_owned())
        }
    }
}

impl From<Option<String>> for VersionSelector {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Latest, Self::from)
    }
}

impl From<VersionSelector> for String {
    fn from(value: VersionSelector) -> Self {
        match value {
            VersionSelector::Latest => "latest".to_owned(),
            VersionSelector::Pinned(v) => v,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Pinned(v) => f.write_str(v),
        }
    }
}

/// Options shared by every managed-runtime (JVM) install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    pub ram_mb: u32,
    pub max_players: u32,
    pub port: u16,
    pub motd: String,
    /// File name the server jar is saved under.
    pub jar_name: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            ram_mb: 4096,
            max_players: 20,
            port: 25565,
            motd: DEFAULT_MOTD.to_owned(),
            jar_name: "server.jar".to_owned(),
        }
    }
}

impl RuntimeOptions {
    /// `jar_name` must name a file directly inside the install directory.
    pub fn validate(&self) -> Result<(), RecordError> {
        if is_plain_file_name(&self.jar_name) {
            Ok(())
        } else {
            Err(RecordError::InvalidJarName(self.jar_name.clone()))
        }
    }
}

/// Managed runtime distributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum RuntimeFlavor {
    Paper,
    Fabric {
        #[serde(default)]
        loader: VersionSelector,
        #[serde(default)]
        installer: VersionSelector,
    },
    Forge {
        #[serde(default)]
        build: VersionSelector,
    },
}

impl RuntimeFlavor {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Paper => "Paper",
            Self::Fabric { .. } => "Fabric",
            Self::Forge { .. } => "Forge",
        }
    }
}

/// Native binary fetched through a package tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBinaryPlan {
    pub app_id: u32,
    pub executable: String,
    /// Archive extracted over the install after the binary is verified.
    #[serde(default)]
    pub overlay_url: Option<String>,
}

/// JVM server whose artifact is resolved from a metadata API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedRuntimePlan {
    #[serde(flatten)]
    pub flavor: RuntimeFlavor,
    #[serde(default)]
    pub version: VersionSelector,
    #[serde(default)]
    pub options: RuntimeOptions,
}

/// What an install should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallPlan {
    NativeBinary(NativeBinaryPlan),
    ManagedRuntime(ManagedRuntimePlan),
}

impl InstallPlan {
    /// Rust dedicated server, optionally with the uMod overlay.
    pub fn rust_dedicated(with_umod: bool) -> Self {
        Self::NativeBinary(NativeBinaryPlan {
            app_id: RUST_DEDICATED_APP_ID,
            executable: RUST_DEDICATED_EXECUTABLE.to_owned(),
            overlay_url: with_umod.then(|| UMOD_RUST_URL.to_owned()),
        })
    }

    pub fn managed(flavor: RuntimeFlavor, version: VersionSelector, options: RuntimeOptions) -> Self {
        Self::ManagedRuntime(ManagedRuntimePlan {
            flavor,
            version,
            options,
        })
    }

    /// Reject options that would write outside the install directory.
    pub fn validate(&self) -> Result<(), RecordError> {
        match self {
            Self::NativeBinary(_) => Ok(()),
            Self::ManagedRuntime(plan) => plan.options.validate(),
        }
    }

    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::NativeBinary(plan) => format!("app {} ({})", plan.app_id, plan.executable),
            Self::ManagedRuntime(plan) => format!("{} {}", plan.flavor.label(), plan.version),
        }
    }
}
