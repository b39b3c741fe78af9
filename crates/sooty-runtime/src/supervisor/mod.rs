//! systemd-backed [`ServiceSupervisor`].
//!
//! Registration writes two artifacts: a launch script under the engine's
//! scripts directory and a unit descriptor that points at it. systemd owns
//! crash recovery through the unit's restart policy; the engine only issues
//! lifecycle commands and reads state back.

mod backend;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sooty_core::ports::{
    CommandError, CommandRunner, LifecycleAction, RegisteredUnit, ServiceSupervisor,
    SupervisorError,
};
use sooty_core::{
    EngineSettings, ServerRecord, Slug, SupervisionMode, UnitSpec, render_launch_script,
    unit_name,
};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

pub use backend::{RootUnitBackend, SYSTEMCTL_TIMEOUT, UnitBackend, UserUnitBackend};

pub struct SystemdSupervisor {
    runner: Arc<dyn CommandRunner>,
    backend: Box<dyn UnitBackend>,
    scripts_dir: PathBuf,
    unit_prefix: String,
}

impl SystemdSupervisor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        backend: Box<dyn UnitBackend>,
        scripts_dir: impl Into<PathBuf>,
        unit_prefix: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            backend,
            scripts_dir: scripts_dir.into(),
            unit_prefix: unit_prefix.into(),
        }
    }

    /// Supervisor for the backend `settings.supervision_mode` selects.
    pub fn from_settings(
        runner: Arc<dyn CommandRunner>,
        settings: &EngineSettings,
    ) -> Result<Self, sooty_core::PathError> {
        let backend: Box<dyn UnitBackend> = match settings.supervision_mode {
            SupervisionMode::User => Box::new(UserUnitBackend::new(
                Arc::clone(&runner),
                sooty_core::paths::user_unit_dir()?,
            )),
            SupervisionMode::Root => Box::new(RootUnitBackend::new(
                Arc::clone(&runner),
                settings.staging_dir(),
            )),
        };
        Ok(Self::new(
            runner,
            backend,
            settings.scripts_dir(),
            settings.unit_prefix.clone(),
        ))
    }

    pub fn unit_name(&self, slug: &Slug) -> String {
        unit_name(&self.unit_prefix, slug)
    }

    pub fn script_path(&self, slug: &Slug) -> PathBuf {
        self.scripts_dir.join(format!("{slug}.sh"))
    }

    async fn write_script(&self, record: &ServerRecord) -> Result<PathBuf, SupervisorError> {
        let path = self.script_path(&record.slug);
        let io_err = |source| SupervisorError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.scripts_dir).await.map_err(io_err)?;
        fs::write(&path, render_launch_script(record))
            .await
            .map_err(io_err)?;
        set_executable(&path).await.map_err(io_err)?;
        Ok(path)
    }

    async fn systemctl(&self, args: &[&str]) -> Result<String, CommandError> {
        self.runner
            .run(self.backend.systemctl(args))
            .await
            .map(|output| output.output)
    }

    async fn lifecycle(&self, slug: &Slug, action: LifecycleAction) -> Result<(), SupervisorError> {
        let unit = self.unit_name(slug);
        self.systemctl(&[action.as_str(), &unit])
            .await
            .map_err(|source| SupervisorError::Operation {
                unit: unit.clone(),
                action,
                source,
            })?;
        info!(%unit, %action, "lifecycle command issued");
        Ok(())
    }
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl ServiceSupervisor for SystemdSupervisor {
    #[instrument(skip(self, record), fields(slug = %record.slug))]
    async fn register(&self, record: &ServerRecord) -> Result<RegisteredUnit, SupervisorError> {
        let spec = UnitSpec::for_server(
            record,
            &self.unit_prefix,
            self.script_path(&record.slug),
            self.backend.wanted_by(),
        );
        let unit = spec.render()?;
        let script_path = self.write_script(record).await?;

        let log_dir = record.base_dir.join("logs");
        if let Err(e) = fs::create_dir_all(&log_dir).await {
            warn!(path = %log_dir.display(), error = %e, "could not create console log directory");
        }

        let unit_path = self.backend.install_unit(&spec.name, &unit).await?;
        self.backend.prepare().await;

        let registration = |step: &'static str| {
            let unit = spec.name.clone();
            move |source| SupervisorError::Registration { unit, step, source }
        };
        self.systemctl(&["daemon-reload"])
            .await
            .map_err(registration("daemon-reload"))?;
        self.systemctl(&["enable", &spec.name])
            .await
            .map_err(registration("enable"))?;

        info!(unit = %spec.name, path = %unit_path.display(), "unit registered");
        Ok(RegisteredUnit {
            unit_name: spec.name,
            unit_path,
            script_path,
        })
    }

    async fn start(&self, slug: &Slug) -> Result<(), SupervisorError> {
        self.lifecycle(slug, LifecycleAction::Start).await
    }

    async fn stop(&self, slug: &Slug) -> Result<(), SupervisorError> {
        self.lifecycle(slug, LifecycleAction::Stop).await
    }

    async fn is_running(&self, slug: &Slug) -> bool {
        let unit = self.unit_name(slug);
        let spec = self
            .backend
            .systemctl(&["is-active", "--quiet", &unit])
            .fail_tolerant();
        match self.runner.run(spec).await {
            Ok(output) => output.success(),
            Err(e) => {
                debug!(%unit, error = %e, "is-active query failed");
                false
            }
        }
    }

    async fn main_pid(&self, slug: &Slug) -> Option<u32> {
        let unit = self.unit_name(slug);
        let spec = self
            .backend
            .systemctl(&["show", "-p", "MainPID", "--value", &unit])
            .fail_tolerant();
        match self.runner.run(spec).await {
            Ok(output) if output.success() => parse_main_pid(&output.output),
            Ok(_) => None,
            Err(e) => {
                debug!(%unit, error = %e, "MainPID query failed");
                None
            }
        }
    }
}

/// systemd reports `0` when the unit has no main process.
fn parse_main_pid(output: &str) -> Option<u32> {
    let value = output.lines().next()?.trim();
    let value = value.strip_prefix("MainPID=").unwrap_or(value);
    value.parse::<u32>().ok().filter(|pid| *pid > 0)
}
