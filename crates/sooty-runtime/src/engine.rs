//! Install and lifecycle orchestration.
//!
//! [`Engine`] is the surface the request layer talks to. Installs run as one
//! background task each and report only through the install-stream
//! registry; the caller gets a stream id back immediately. Lifecycle, status
//! and metrics calls are synchronous pass-throughs to the supervisor and
//! monitor.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::json;
use sooty_core::ports::{
    ArtifactFetcher, CommandRunner, FetchError, InstallError, InstallReport, Installer,
    LifecycleAction, LineCallback, MonitorError, PlayerCount, RconClient, RconError,
    RegisteredUnit, ResourceMonitor, ResourceSample, ServerMetrics, ServiceStatus,
    ServiceSupervisor, SupervisorError,
};
use sooty_core::{
    EngineSettings, InstallPlan, PathError, RconEndpoint, RecordError, ServerRecord, Slug,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::SystemCommandRunner;
use crate::install::{HttpArtifactFetcher, InstallerPipeline};
use crate::monitor::SysinfoMonitor;
use crate::rcon::{TcpRconClient, query_player_count};
use crate::streams::{InstallEventStream, InstallStreamRegistry, StreamHandle};
use crate::supervisor::SystemdSupervisor;

/// Final line of a successful install.
pub const INSTALL_DONE_LINE: &str = "[done] Server created. You can start it now.";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid server record: {0}")]
    Record(#[from] RecordError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Rcon(#[from] RconError),

    #[error("Server {slug} has no RCON endpoint configured")]
    RconNotConfigured { slug: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Adapters the engine drives.
pub struct EnginePorts {
    pub installer: Arc<dyn Installer>,
    pub supervisor: Arc<dyn ServiceSupervisor>,
    pub monitor: Arc<dyn ResourceMonitor>,
    pub rcon: Arc<dyn RconClient>,
}

impl EnginePorts {
    /// Production adapters for `settings`.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, EngineError> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
        let fetcher: Arc<dyn ArtifactFetcher> = Arc::new(HttpArtifactFetcher::new()?);
        Ok(Self {
            installer: Arc::new(InstallerPipeline::new(
                Arc::clone(&runner),
                fetcher,
                settings,
            )),
            supervisor: Arc::new(SystemdSupervisor::from_settings(runner, settings)?),
            monitor: Arc::new(SysinfoMonitor::new()),
            rcon: Arc::new(TcpRconClient::new()),
        })
    }
}

/// Install directories with an install in flight.
#[derive(Clone, Default)]
struct TargetLocks {
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl TargetLocks {
    fn acquire(&self, target: &Path) -> Result<TargetGuard, InstallError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(target.to_path_buf()) {
            return Err(InstallError::AlreadyInProgress {
                path: target.to_path_buf(),
            });
        }
        Ok(TargetGuard {
            locks: self.clone(),
            target: target.to_path_buf(),
        })
    }
}

struct TargetGuard {
    locks: TargetLocks,
    target: PathBuf,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.locks
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.target);
    }
}

/// Append-only copy of an install's lines under `install-logs/`.
fn open_install_log(dir: &Path, stream_id: &str) -> Option<Mutex<File>> {
    let path = dir.join(format!("{stream_id}.log"));
    let opened = fs::create_dir_all(dir).and_then(|()| {
        OpenOptions::new().create(true).append(true).open(&path)
    });
    match opened {
        Ok(file) => Some(Mutex::new(file)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "install log unavailable");
            None
        }
    }
}

/// Stream id for the `seq`th install of `slug`, started now.
pub fn stream_id(slug: &Slug, seq: u64) -> String {
    format!("{slug}-{}-{seq}", chrono::Utc::now().timestamp_millis())
}

pub struct Engine {
    settings: EngineSettings,
    ports: EnginePorts,
    streams: InstallStreamRegistry,
    locks: TargetLocks,
    next_stream: AtomicU64,
}

impl Engine {
    pub fn new(settings: EngineSettings, ports: EnginePorts) -> Self {
        let streams =
            InstallStreamRegistry::new(settings.stream_retention(), settings.stream_max_age());
        Self {
            settings,
            ports,
            streams,
            locks: TargetLocks::default(),
            next_stream: AtomicU64::new(1),
        }
    }

    /// Engine wired with the production adapters.
    pub fn from_settings(settings: EngineSettings) -> Result<Self, EngineError> {
        let ports = EnginePorts::from_settings(&settings)?;
        Ok(Self::new(settings, ports))
    }

    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub const fn streams(&self) -> &InstallStreamRegistry {
        &self.streams
    }

    /// Start the periodic stream sweep.
    pub fn spawn_stream_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.streams
            .spawn_sweeper(self.settings.stream_sweep_interval(), cancel)
    }

    /// `record` with an unset `base_dir` placed under `GAME_ROOT`.
    fn resolve(&self, record: ServerRecord) -> Result<ServerRecord, EngineError> {
        let record = record.with_default_base_dir(&self.settings.game_root);
        record.validate()?;
        Ok(record)
    }

    /// Install `record` with `plan` in the background, then register its
    /// unit. Returns the id of the stream that reports progress.
    pub fn start_install(
        &self,
        record: ServerRecord,
        plan: InstallPlan,
    ) -> Result<String, EngineError> {
        let record = self.resolve(record)?;
        plan.validate()?;
        let seq = self.next_stream.fetch_add(1, Ordering::Relaxed);
        let id = stream_id(&record.slug, seq);
        let handle = self.streams.create(&id);
        info!(stream_id = %id, slug = %record.slug, plan = %plan.describe(), "install started");

        let job = InstallJob {
            installer: Arc::clone(&self.ports.installer),
            supervisor: Arc::clone(&self.ports.supervisor),
            streams: self.streams.clone(),
            locks: self.locks.clone(),
            log_dir: self.settings.install_logs_dir(),
            timeout: self.settings.install_timeout(),
            handle,
            record,
            plan,
        };
        tokio::spawn(job.run());
        Ok(id)
    }

    pub fn subscribe(&self, stream_id: &str) -> Option<InstallEventStream> {
        self.streams.subscribe(stream_id)
    }

    pub fn stream(&self, stream_id: &str) -> Option<StreamHandle> {
        self.streams.get(stream_id)
    }

    /// Write the launch script and unit for `record` without installing.
    pub async fn register(&self, record: &ServerRecord) -> Result<RegisteredUnit, EngineError> {
        let record = self.resolve(record.clone())?;
        Ok(self.ports.supervisor.register(&record).await?)
    }

    pub async fn lifecycle(&self, slug: &Slug, action: LifecycleAction) -> Result<(), EngineError> {
        self.ports.supervisor.apply(slug, action).await.map_err(|e| {
            warn!(%slug, %action, error = %e, "lifecycle operation failed");
            EngineError::from(e)
        })
    }

    pub async fn status(&self, slug: &Slug) -> ServiceStatus {
        self.ports.supervisor.status(slug).await
    }

    pub async fn sample(&self, pid: u32) -> Result<ResourceSample, EngineError> {
        Ok(self.ports.monitor.sample(pid).await?)
    }

    /// Resource usage of the server's main process; stopped servers and
    /// processes that exit mid-sample report [`ServerMetrics::stopped`].
    pub async fn metrics(&self, slug: &Slug) -> ServerMetrics {
        let Some(pid) = self.ports.supervisor.main_pid(slug).await else {
            return ServerMetrics::stopped();
        };
        match self.ports.monitor.sample(pid).await {
            Ok(sample) => sample.into(),
            Err(e) => {
                debug!(%slug, pid, error = %e, "process vanished while sampling");
                ServerMetrics::stopped()
            }
        }
    }

    /// Send one console command with the configured deadline.
    pub async fn rcon_command(
        &self,
        endpoint: &RconEndpoint,
        command: &str,
    ) -> Result<String, EngineError> {
        self.rcon_command_with_timeout(endpoint, command, self.settings.rcon_timeout())
            .await
    }

    pub async fn rcon_command_with_timeout(
        &self,
        endpoint: &RconEndpoint,
        command: &str,
        timeout: Duration,
    ) -> Result<String, EngineError> {
        Ok(self.ports.rcon.execute(endpoint, command, timeout).await?)
    }

    /// Best-effort player count for `record`.
    pub async fn player_count(&self, record: &ServerRecord) -> Result<PlayerCount, EngineError> {
        let endpoint = record
            .rcon
            .as_ref()
            .ok_or_else(|| EngineError::RconNotConfigured {
                slug: record.slug.to_string(),
            })?;
        Ok(query_player_count(
            self.ports.rcon.as_ref(),
            endpoint,
            record.game,
            self.settings.rcon_timeout(),
        )
        .await?)
    }
}

/// Everything one background install needs.
struct InstallJob {
    installer: Arc<dyn Installer>,
    supervisor: Arc<dyn ServiceSupervisor>,
    streams: InstallStreamRegistry,
    locks: TargetLocks,
    log_dir: PathBuf,
    timeout: Option<Duration>,
    handle: StreamHandle,
    record: ServerRecord,
    plan: InstallPlan,
}

impl InstallJob {
    async fn run(self) {
        let id = self.handle.id().to_owned();
        let streams = self.streams.clone();
        let on_line = self.line_sink();
        let sink = on_line.clone();

        // A panicking install still ends its stream.
        let outcome = match tokio::spawn(self.execute(on_line)).await {
            Ok(outcome) => outcome,
            Err(join) => {
                error!(stream_id = %id, error = %join, "install task aborted");
                Err(InstallFailure::Aborted(join.to_string()))
            }
        };

        match outcome {
            Ok(payload) => {
                sink(INSTALL_DONE_LINE);
                streams.complete(&id, true, payload);
            }
            Err(failure) => {
                let message = failure.to_string();
                sink(&format!("[error] {message}"));
                streams.complete(
                    &id,
                    false,
                    json!({ "message": message, "step": failure.step() }),
                );
            }
        }
    }

    fn line_sink(&self) -> LineCallback {
        let handle = self.handle.clone();
        let log = open_install_log(&self.log_dir, handle.id());
        Arc::new(move |line: &str| {
            debug!(stream_id = %handle.id(), line, "install output");
            handle.emit(line);
            if let Some(log) = &log {
                let mut file = log.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = writeln!(file, "{line}");
            }
        })
    }

    async fn execute(self, on_line: LineCallback) -> Result<serde_json::Value, InstallFailure> {
        let target = self.record.base_dir.clone();
        let _guard = self.locks.acquire(&target)?;

        let install = self.installer.install(&self.plan, &target, on_line.clone());
        let report = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, install)
                .await
                .map_err(|_| InstallError::TimedOut { after: limit })??,
            None => install.await?,
        };

        on_line("[installer] Registering service...");
        let unit = self.supervisor.register(&self.record).await?;
        on_line(&format!("[installer] Service {} registered", unit.unit_name));

        Ok(success_payload(&self.record, &report, &unit))
    }
}

fn success_payload(
    record: &ServerRecord,
    report: &InstallReport,
    unit: &RegisteredUnit,
) -> serde_json::Value {
    json!({
        "slug": record.slug,
        "base_dir": report.target,
        "service_name": unit.unit_name,
        "unit_path": unit.unit_path,
        "script_path": unit.script_path,
        "version": report.version,
        "executable": report.executable,
    })
}

#[derive(Debug, Error)]
enum InstallFailure {
    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Register(#[from] SupervisorError),

    #[error("Install task aborted: {0}")]
    Aborted(String),
}

impl InstallFailure {
    fn step(&self) -> &'static str {
        match self {
            Self::Install(e) => e.step().as_str(),
            Self::Register(_) => "register",
            Self::Aborted(_) => "aborted",
        }
    }
}
