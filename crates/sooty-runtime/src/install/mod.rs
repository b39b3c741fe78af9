//! Installer pipeline.
//!
//! Every install runs the same stages: preflight (target writable, data
//! directories present), dependency checks, then the plan-specific provision
//! steps. Progress is reported line by line through the caller's callback.

mod config_files;
mod deps;
mod fetch;
mod managed;
mod native;
mod overlay;
mod preflight;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sooty_core::ports::{
    ArtifactFetcher, CommandRunner, InstallError, InstallReport, InstallStep, Installer,
    LineCallback,
};
use sooty_core::{EngineSettings, InstallPlan};
use tracing::{info, instrument};

pub use config_files::{
    EULA_FILE, PROPERTIES_FILE, START_SCRIPT, render_eula, render_forge_start_script,
    render_jar_start_script, render_server_properties,
};
pub use deps::{Dependency, ensure_dependency};
pub use fetch::HttpArtifactFetcher;
pub use managed::ManagedInstall;
pub use native::{NativeInstall, find_executable, steamcmd_args};
pub use overlay::extract_overlay;
pub use preflight::prepare_target;

/// The production [`Installer`].
pub struct InstallerPipeline {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn ArtifactFetcher>,
    steamcmd_path: PathBuf,
    downloads_dir: PathBuf,
    home_dir: Option<PathBuf>,
}

impl InstallerPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn ArtifactFetcher>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            runner,
            fetcher,
            steamcmd_path: settings.steamcmd_path.clone(),
            downloads_dir: settings.downloads_dir(),
            home_dir: sooty_core::paths::home_dir().ok(),
        }
    }

    /// Override the `HOME` handed to steamcmd.
    #[must_use]
    pub fn with_home_dir(mut self, home: Option<PathBuf>) -> Self {
        self.home_dir = home;
        self
    }
}

#[async_trait]
impl Installer for InstallerPipeline {
    #[instrument(skip(self, plan, on_line), fields(plan = %plan.describe(), target = %target.display()))]
    async fn install(
        &self,
        plan: &InstallPlan,
        target: &Path,
        on_line: LineCallback,
    ) -> Result<InstallReport, InstallError> {
        plan.validate()?;
        on_line(&format!("[installer] Installing {}", plan.describe()));
        on_line(&format!("[installer] Target: {}", target.display()));

        prepare_target(self.runner.as_ref(), target, &on_line).await?;
        tokio::fs::create_dir_all(&self.downloads_dir)
            .await
            .map_err(|e| InstallError::io(InstallStep::Preflight, &self.downloads_dir, e))?;

        let report = match plan {
            InstallPlan::NativeBinary(native) => {
                let steamcmd = ensure_dependency(
                    self.runner.as_ref(),
                    &Dependency::steamcmd(&self.steamcmd_path),
                    &on_line,
                )
                .await?;
                NativeInstall {
                    runner: self.runner.as_ref(),
                    fetcher: self.fetcher.as_ref(),
                    steamcmd: &steamcmd,
                    downloads_dir: &self.downloads_dir,
                    home_dir: self.home_dir.as_deref(),
                }
                .run(native, target, &on_line)
                .await?
            }
            InstallPlan::ManagedRuntime(managed) => {
                ManagedInstall {
                    runner: self.runner.as_ref(),
                    fetcher: self.fetcher.as_ref(),
                }
                .run(managed, target, &on_line)
                .await?
            }
        };

        info!(target = %target.display(), "install finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRunner, ScriptedFetcher};
    use sooty_core::{RuntimeFlavor, RuntimeOptions, VersionSelector, noop_line_callback};
    use tempfile::TempDir;

    fn pipeline(
        temp: &TempDir,
        runner: Arc<RecordingRunner>,
        fetcher: Arc<ScriptedFetcher>,
    ) -> InstallerPipeline {
        let mut settings = EngineSettings::with_defaults(temp.path().join("data"));
        settings.steamcmd_path = temp.path().join("steamcmd");
        InstallerPipeline::new(runner, fetcher, &settings).with_home_dir(None)
    }

    fn paper() -> InstallPlan {
        InstallPlan::managed(
            RuntimeFlavor::Paper,
            VersionSelector::Latest,
            RuntimeOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_file_in_the_way_fails_before_any_network_access() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("occupied");
        std::fs::write(&target, "not a directory").unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let fetcher = Arc::new(ScriptedFetcher::default());

        let err = pipeline(&temp, Arc::clone(&runner), Arc::clone(&fetcher))
            .install(&paper(), &target, noop_line_callback())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::NotWritable { .. }));
        assert!(err.to_string().contains("GAME_ROOT"));
        assert!(fetcher.requests().is_empty());
        assert!(runner.programs().is_empty());
    }

    #[tokio::test]
    async fn test_absolute_jar_name_fails_before_touching_the_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("alpha");
        let outside = temp.path().join("outside.jar");
        let runner = Arc::new(RecordingRunner::default());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let plan = InstallPlan::managed(
            RuntimeFlavor::Paper,
            VersionSelector::Latest,
            RuntimeOptions {
                jar_name: outside.to_string_lossy().into_owned(),
                ..RuntimeOptions::default()
            },
        );

        let err = pipeline(&temp, Arc::clone(&runner), Arc::clone(&fetcher))
            .install(&plan, &target, noop_line_callback())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::InvalidPlan(_)));
        assert_eq!(err.step(), InstallStep::Preflight);
        assert!(!target.exists());
        assert!(!outside.exists());
        assert!(fetcher.requests().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_target_fails_before_any_network_access() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let parent = temp.path().join("locked");
        std::fs::create_dir(&parent).unwrap();
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores permission bits.
        if sooty_core::verify_writable(&parent).is_ok() {
            return;
        }
        let runner = Arc::new(RecordingRunner::default());
        let fetcher = Arc::new(ScriptedFetcher::default());

        let err = pipeline(&temp, Arc::clone(&runner), Arc::clone(&fetcher))
            .install(&paper(), &parent.join("alpha"), noop_line_callback())
            .await
            .unwrap_err();
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(err, InstallError::NotWritable { .. }));
        assert!(fetcher.requests().is_empty());
        assert!(runner.programs().iter().all(|p| p == "sudo"));
    }

    #[tokio::test]
    async fn test_native_install_without_steamcmd_reports_missing_dependency() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::with_handler(|_| {
            Ok(crate::testing::exit_output(1, "sudo: a password is required"))
        }));
        let fetcher = Arc::new(ScriptedFetcher::default());
        let mut installer = pipeline(&temp, Arc::clone(&runner), Arc::clone(&fetcher));
        installer.steamcmd_path = temp.path().join("definitely-not-steamcmd");

        let plan = InstallPlan::rust_dedicated(false);
        let result = installer
            .install(&plan, &temp.path().join("rust"), noop_line_callback())
            .await;

        // A steamcmd on PATH makes this host unsuitable for the check.
        if which::which("steamcmd").is_ok() {
            return;
        }
        let err = result.unwrap_err();
        assert_eq!(err.step(), InstallStep::Dependencies);
        assert!(fetcher.requests().is_empty());
        assert!(temp.path().join("data").join("downloads").is_dir());
    }

    #[tokio::test]
    async fn test_native_install_auto_installs_steamcmd_then_verifies() {
        if which::which("steamcmd").is_ok() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let steamcmd = temp.path().join("steamcmd");
        let target = temp.path().join("servers").join("alpha");
        let (tool, server) = (steamcmd.clone(), target.clone());
        let runner = Arc::new(RecordingRunner::with_handler(move |spec| {
            if spec.args.iter().any(|a| a == "install") && spec.args.iter().any(|a| a == "steamcmd") {
                std::fs::write(&tool, "").unwrap();
            }
            if spec.program == tool.to_string_lossy() {
                std::fs::write(server.join("RustDedicated"), "").unwrap();
                return Ok(crate::testing::ok_output("Success! App '258550' fully installed."));
            }
            Ok(crate::testing::ok_output(""))
        }));
        let fetcher = Arc::new(ScriptedFetcher::default());
        let lines = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&lines);
        let on_line: LineCallback = Arc::new(move |l: &str| sink.lock().unwrap().push(l.to_owned()));

        let report = pipeline(&temp, Arc::clone(&runner), fetcher)
            .install(&InstallPlan::rust_dedicated(false), &target, on_line)
            .await
            .unwrap();

        assert_eq!(report.executable, Some(target.join("RustDedicated")));
        let programs = runner.programs();
        assert_eq!(programs.last().map(String::as_str), Some(steamcmd.to_str().unwrap()));
        assert_eq!(
            runner.commands()[..2],
            [
                "sudo -n env 'DEBIAN_FRONTEND=noninteractive' apt-get update",
                "sudo -n env 'DEBIAN_FRONTEND=noninteractive' apt-get install -y steamcmd"
            ]
        );
        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("steamcmd installed at")));
        assert_eq!(lines.last().unwrap(), "[installer] RustDedicated installed OK");
    }
}
