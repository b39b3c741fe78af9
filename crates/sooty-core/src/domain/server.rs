//! Server identity and the persisted server record.
//!
//! A [`ServerRecord`] is owned by the caller's storage layer; the engine only
//! reads it to render launch scripts and unit descriptors.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a server slug.
pub const SLUG_MAX_LEN: usize = 32;

/// Minimum length accepted for an RCON password.
pub const RCON_PASSWORD_MIN_LEN: usize = 6;

/// Default game port for Rust dedicated servers.
pub const DEFAULT_RUST_PORT: u16 = 28015;

/// Default query port for Rust dedicated servers.
pub const DEFAULT_RUST_QUERY_PORT: u16 = 28017;

/// Default RCON port for Rust dedicated servers.
pub const DEFAULT_RUST_RCON_PORT: u16 = 28016;

/// Default game port for Minecraft servers.
pub const DEFAULT_MINECRAFT_PORT: u16 = 25565;

/// Errors produced while validating a slug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("Slug cannot be empty")]
    Empty,

    #[error("Slug is {0} characters long, maximum is {SLUG_MAX_LEN}")]
    TooLong(usize),

    #[error("Slug contains invalid character {0:?}, only [A-Za-z0-9_-] are allowed")]
    InvalidChar(char),
}

/// Short machine identifier for a server (`[A-Za-z0-9_-]{1,32}`).
///
/// Slugs end up in file names, unit names and shell scripts, so the
/// character set is restricted at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validate and wrap a slug.
    pub fn parse(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SlugError::Empty);
        }
        let len = value.chars().count();
        if len > SLUG_MAX_LEN {
            return Err(SlugError::TooLong(len));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(SlugError::InvalidChar(bad));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supported game families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// Facepunch Rust dedicated server, installed through steamcmd.
    Rust,
    /// Java edition Minecraft server (Paper, Fabric or Forge).
    Minecraft,
}

impl GameKind {
    /// Human readable name used in unit descriptions.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Rust => "Rust",
            Self::Minecraft => "Minecraft",
        }
    }

    /// Console command that reports connected players.
    pub const fn player_query_command(self) -> &'static str {
        match self {
            Self::Rust => "status",
            Self::Minecraft => "list",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Network location and credentials of a server's remote console.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconEndpoint {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl RconEndpoint {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }

    /// `host:port` form suitable for socket connection.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for RconEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validation failures for a [`ServerRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("RCON password must be at least {RCON_PASSWORD_MIN_LEN} characters")]
    RconPasswordTooShort,

    #[error("Port {0} is not a valid game port")]
    InvalidPort(u16),

    #[error("max_players must be at least 1")]
    InvalidMaxPlayers,

    #[error("Base directory must be an absolute path: {}", .0.display())]
    RelativeBaseDir(PathBuf),

    #[error("Base directory contains a control character: {0:?}")]
    ControlCharInBaseDir(PathBuf),

    #[error("jar_name {0:?} must be a plain file name")]
    InvalidJarName(String),
}

/// `name` is a single path component with no separators or control
/// characters, so joining it onto a directory stays inside that directory.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

/// Everything the engine needs to know about one server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub slug: Slug,
    /// Display name; falls back to the slug when empty.
    #[serde(default)]
    pub name: String,
    pub game: GameKind,
    /// Install directory; empty means `<GAME_ROOT>/<slug>`.
    #[serde(default)]
    pub base_dir: PathBuf,
    pub port: u16,
    #[serde(default)]
    pub query_port: Option<u16>,
    #[serde(default)]
    pub rcon: Option<RconEndpoint>,
    pub max_players: u32,
    #[serde(default)]
    pub world_size: Option<u32>,
    #[serde(default)]
    pub seed: Option<u32>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Heap size for JVM based servers.
    #[serde(default)]
    pub ram_mb: Option<u32>,
    #[serde(default)]
    pub jar_name: Option<String>,
    /// Hard memory ceiling applied by the supervisor.
    #[serde(default)]
    pub memory_limit_mib: Option<u64>,
}

impl ServerRecord {
    /// A Rust dedicated server with stock ports.
    pub fn rust(slug: Slug, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: slug.to_string(),
            slug,
            game: GameKind::Rust,
            base_dir: base_dir.into(),
            port: DEFAULT_RUST_PORT,
            query_port: Some(DEFAULT_RUST_QUERY_PORT),
            rcon: None,
            max_players: 50,
            world_size: Some(3500),
            seed: Some(0),
            level: Some("Procedural Map".to_owned()),
            description: None,
            ram_mb: None,
            jar_name: None,
            memory_limit_mib: None,
        }
    }

    /// A Minecraft server with stock port and player limit.
    pub fn minecraft(slug: Slug, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: slug.to_string(),
            slug,
            game: GameKind::Minecraft,
            base_dir: base_dir.into(),
            port: DEFAULT_MINECRAFT_PORT,
            query_port: None,
            rcon: None,
            max_players: 20,
            world_size: None,
            seed: None,
            level: None,
            description: None,
            ram_mb: Some(2048),
            jar_name: None,
            memory_limit_mib: None,
        }
    }

    #[must_use]
    pub fn with_rcon(mut self, rcon: RconEndpoint) -> Self {
        self.rcon = Some(rcon);
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }

    #[must_use]
    pub const fn with_memory_limit_mib(mut self, limit: u64) -> Self {
        self.memory_limit_mib = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_ram_mb(mut self, ram_mb: u32) -> Self {
        self.ram_mb = Some(ram_mb);
        self
    }

    /// Fill an empty `base_dir` with `<game_root>/<slug>`.
    #[must_use]
    pub fn with_default_base_dir(mut self, game_root: &Path) -> Self {
        if self.base_dir.as_os_str().is_empty() {
            self.base_dir = game_root.join(self.slug.as_str());
        }
        self
    }

    /// Name shown in unit descriptions.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.slug.as_str()
        } else {
            &self.name
        }
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.port == 0 {
            return Err(RecordError::InvalidPort(self.port));
        }
        if self.max_players == 0 {
            return Err(RecordError::InvalidMaxPlayers);
        }
        if !self.base_dir.is_absolute() {
            return Err(RecordError::RelativeBaseDir(self.base_dir.clone()));
        }
        if self.base_dir.to_string_lossy().chars().any(char::is_control) {
            return Err(RecordError::ControlCharInBaseDir(self.base_dir.clone()));
        }
        if let Some(jar) = &self.jar_name {
            if !is_plain_file_name(jar) {
                return Err(RecordError::InvalidJarName(jar.clone()));
            }
        }
        if let Some(rcon) = &self.rcon {
            if rcon.password.chars().count() < RCON_PASSWORD_MIN_LEN {
                return Err(RecordError::RconPasswordTooShort);
            }
            if rcon.port == 0 {
                return Err(RecordError::InvalidPort(rcon.port));
            }
        }
        Ok(())
    }
}
