//! Privilege backends for systemd supervision.
//!
//! The user backend manages `systemctl --user` units written straight into
//! the user's unit directory. The root backend manages system units through
//! non-interactive sudo, staging the descriptor in the data directory and
//! copying it into place with `install`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sooty_core::paths::ROOT_UNIT_DIR;
use sooty_core::ports::{CommandRunner, CommandSpec, SupervisorError};
use tokio::fs;
use tracing::{debug, warn};

/// Upper bound for a single systemctl or sudo call.
pub const SYSTEMCTL_TIMEOUT: Duration = Duration::from_secs(60);

/// How units are written and how systemctl is invoked.
#[async_trait]
pub trait UnitBackend: Send + Sync {
    /// Final location of `unit`.
    fn unit_path(&self, unit: &str) -> PathBuf;

    /// `[Install] WantedBy=` target.
    fn wanted_by(&self) -> &'static str;

    /// A systemctl invocation with `args`.
    fn systemctl(&self, args: &[&str]) -> CommandSpec;

    /// Put the rendered unit in place; returns its path.
    async fn install_unit(&self, unit: &str, contents: &str) -> Result<PathBuf, SupervisorError>;

    /// One-time host preparation run on every registration. Best effort.
    async fn prepare(&self) {}
}

async fn write_file(path: &Path, contents: &str) -> Result<(), SupervisorError> {
    let io_err = |source| SupervisorError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    fs::write(path, contents).await.map_err(io_err)
}

/// Per-user units under `~/.config/systemd/user`.
pub struct UserUnitBackend {
    runner: Arc<dyn CommandRunner>,
    unit_dir: PathBuf,
    user: Option<String>,
}

impl UserUnitBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            unit_dir: unit_dir.into(),
            user: current_user(),
        }
    }

    /// Override the account lingering is enabled for.
    #[must_use]
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }
}

#[async_trait]
impl UnitBackend for UserUnitBackend {
    fn unit_path(&self, unit: &str) -> PathBuf {
        self.unit_dir.join(unit)
    }

    fn wanted_by(&self) -> &'static str {
        "default.target"
    }

    fn systemctl(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("systemctl")
            .arg("--user")
            .args(args.iter().copied())
            .with_timeout(SYSTEMCTL_TIMEOUT)
    }

    async fn install_unit(&self, unit: &str, contents: &str) -> Result<PathBuf, SupervisorError> {
        let path = self.unit_path(unit);
        write_file(&path, contents).await?;
        debug!(unit, path = %path.display(), "user unit written");
        Ok(path)
    }

    /// User services only outlive the login session with lingering enabled.
    async fn prepare(&self) {
        let Some(user) = &self.user else {
            return;
        };
        let spec = CommandSpec::new("sudo")
            .args(["-n", "loginctl", "enable-linger"])
            .arg(user.clone())
            .with_timeout(SYSTEMCTL_TIMEOUT)
            .fail_tolerant();
        match self.runner.run(spec).await {
            Ok(output) if output.success() => debug!(%user, "lingering enabled"),
            Ok(output) => warn!(
                %user,
                output = %output.output.trim(),
                "could not enable lingering; user services stop at logout"
            ),
            Err(e) => warn!(%user, error = %e, "could not run loginctl"),
        }
    }
}

/// System units under `/etc/systemd/system`, managed through sudo.
pub struct RootUnitBackend {
    runner: Arc<dyn CommandRunner>,
    unit_dir: PathBuf,
    staging_dir: PathBuf,
}

impl RootUnitBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            unit_dir: PathBuf::from(ROOT_UNIT_DIR),
            staging_dir: staging_dir.into(),
        }
    }

    #[must_use]
    pub fn with_unit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = dir.into();
        self
    }
}

#[async_trait]
impl UnitBackend for RootUnitBackend {
    fn unit_path(&self, unit: &str) -> PathBuf {
        self.unit_dir.join(unit)
    }

    fn wanted_by(&self) -> &'static str {
        "multi-user.target"
    }

    fn systemctl(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("sudo")
            .args(["-n", "systemctl"])
            .args(args.iter().copied())
            .with_timeout(SYSTEMCTL_TIMEOUT)
    }

    async fn install_unit(&self, unit: &str, contents: &str) -> Result<PathBuf, SupervisorError> {
        let staged = self.staging_dir.join(unit);
        write_file(&staged, contents).await?;

        let dest = self.unit_path(unit);
        let spec = CommandSpec::new("sudo")
            .args(["-n", "install", "-m", "0644"])
            .arg(staged.to_string_lossy())
            .arg(dest.to_string_lossy())
            .with_timeout(SYSTEMCTL_TIMEOUT);
        self.runner
            .run(spec)
            .await
            .map_err(|source| SupervisorError::Registration {
                unit: unit.to_owned(),
                step: "install unit file",
                source,
            })?;
        let _ = fs::remove_file(&staged).await;
        debug!(unit, path = %dest.display(), "system unit installed");
        Ok(dest)
    }
}

#[cfg(unix)]
fn current_user() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
}

#[cfg(not(unix))]
fn current_user() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_user_backend_writes_unit_directly() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let backend = UserUnitBackend::new(runner.clone(), temp.path().join("user"));

        let path = backend
            .install_unit("sootypage-alpha.service", "[Unit]\n")
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[Unit]\n");
        assert!(runner.programs().is_empty());
        assert_eq!(
            backend.systemctl(&["start", "x.service"]).display(),
            "systemctl --user start x.service"
        );
    }

    #[tokio::test]
    async fn test_user_backend_lingering_is_best_effort() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::with_handler(|_| {
            Ok(crate::testing::exit_output(1, "sudo: a password is required"))
        }));
        let backend = UserUnitBackend::new(runner.clone(), temp.path())
            .with_user(Some("panel".to_owned()));

        backend.prepare().await;
        assert_eq!(runner.commands(), vec!["sudo -n loginctl enable-linger panel"]);
    }

    #[tokio::test]
    async fn test_root_backend_stages_then_installs() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let backend = RootUnitBackend::new(runner.clone(), temp.path().join("staging"))
            .with_unit_dir("/etc/systemd/system");

        let path = backend
            .install_unit("sootypage-alpha.service", "[Unit]\n")
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("/etc/systemd/system/sootypage-alpha.service"));
        let staged = temp.path().join("staging").join("sootypage-alpha.service");
        assert_eq!(
            runner.commands(),
            vec![format!(
                "sudo -n install -m 0644 {} /etc/systemd/system/sootypage-alpha.service",
                staged.display()
            )]
        );
        assert!(!staged.exists());
        assert_eq!(
            backend.systemctl(&["daemon-reload"]).display(),
            "sudo -n systemctl daemon-reload"
        );
    }

    #[tokio::test]
    async fn test_root_backend_install_failure_is_registration_error() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::with_handler(|_| {
            Ok(crate::testing::exit_output(1, "sudo: a password is required"))
        }));
        let backend = RootUnitBackend::new(runner, temp.path());

        let err = backend
            .install_unit("sootypage-alpha.service", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::Registration {
                step: "install unit file",
                ..
            }
        ));
    }
}
