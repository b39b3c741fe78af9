//! Native binary installs through steamcmd.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use sooty_core::ports::{
    ArtifactFetcher, CommandRunner, CommandSpec, InstallError, InstallReport, InstallStep,
    LineCallback,
};
use sooty_core::NativeBinaryPlan;
use tracing::info;

use super::config_files::set_executable;
use super::overlay::extract_overlay;

/// How deep below the install directory to look for the executable.
const EXECUTABLE_SEARCH_DEPTH: usize = 3;

/// Directory entries listed when verification fails.
const LISTING_LIMIT: usize = 50;

pub struct NativeInstall<'a> {
    pub runner: &'a dyn CommandRunner,
    pub fetcher: &'a dyn ArtifactFetcher,
    pub steamcmd: &'a Path,
    pub downloads_dir: &'a Path,
    pub home_dir: Option<&'a Path>,
}

impl NativeInstall<'_> {
    pub async fn run(
        &self,
        plan: &NativeBinaryPlan,
        target: &Path,
        on_line: &LineCallback,
    ) -> Result<InstallReport, InstallError> {
        on_line(&format!(
            "[installer] Running steamcmd (app {})...",
            plan.app_id
        ));
        let mut spec = CommandSpec::new(self.steamcmd.to_string_lossy())
            .args(steamcmd_args(target, plan.app_id))
            .on_line(on_line.clone());
        if let Some(home) = self.home_dir {
            spec = spec.env("HOME", home.to_string_lossy());
        }
        self.runner
            .run(spec)
            .await
            .map_err(|e| InstallError::command(InstallStep::Provision, e))?;

        let executable = find_executable(target, &plan.executable)
            .ok_or_else(|| InstallError::VerificationFailed {
                expected: plan.executable.clone(),
                dir: target.to_path_buf(),
                listing: list_dir(target),
            })?;
        set_executable(&executable).await.map_err(|e| match e {
            InstallError::Io { path, source, .. } => InstallError::io(InstallStep::Verify, path, source),
            other => other,
        })?;
        info!(executable = %executable.display(), "native binary verified");
        on_line(&format!("[installer] {} installed OK", plan.executable));

        if let Some(url) = &plan.overlay_url {
            self.install_overlay(url, target, on_line).await?;
        }

        Ok(InstallReport {
            target: target.to_path_buf(),
            version: None,
            executable: Some(executable),
            generated: Vec::new(),
        })
    }

    async fn install_overlay(
        &self,
        url: &str,
        target: &Path,
        on_line: &LineCallback,
    ) -> Result<(), InstallError> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let archive = self.downloads_dir.join(format!("overlay-{stamp}.zip"));
        self.fetcher
            .download(url, &archive, Some(on_line.clone()))
            .await
            .map_err(|e| InstallError::fetch(InstallStep::Overlay, e))?;

        on_line("[installer] Extracting overlay...");
        let count = extract_overlay(&archive, target).await?;
        let _ = tokio::fs::remove_file(&archive).await;
        on_line(&format!("[installer] Overlay installed OK ({count} files)"));
        Ok(())
    }
}

pub fn steamcmd_args(target: &Path, app_id: u32) -> Vec<String> {
    vec![
        "+force_install_dir".to_owned(),
        target.to_string_lossy().into_owned(),
        "+login".to_owned(),
        "anonymous".to_owned(),
        "+app_update".to_owned(),
        app_id.to_string(),
        "validate".to_owned(),
        "+quit".to_owned(),
    ]
}

/// Breadth-first search for a file named `name`.
pub fn find_executable(root: &Path, name: &str) -> Option<PathBuf> {
    let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::from([(root.to_path_buf(), 0)]);
    while let Some((dir, depth)) = queue.pop_front() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_file() && entry.file_name() == name {
                return Some(path);
            }
            if file_type.is_dir() && depth < EXECUTABLE_SEARCH_DEPTH {
                subdirs.push(path);
            }
        }
        subdirs.sort();
        queue.extend(subdirs.into_iter().map(|d| (d, depth + 1)));
    }
    None
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.truncate(LISTING_LIMIT);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRunner, ScriptedFetcher, exit_output, ok_output};
    use sooty_core::{InstallPlan, noop_line_callback};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn rust_plan() -> NativeBinaryPlan {
        match InstallPlan::rust_dedicated(false) {
            InstallPlan::NativeBinary(plan) => plan,
            InstallPlan::ManagedRuntime(_) => unreachable!(),
        }
    }

    #[test]
    fn test_steamcmd_args() {
        let args = steamcmd_args(Path::new("/srv/rust/alpha"), 258_550);
        assert_eq!(
            args.join(" "),
            "+force_install_dir /srv/rust/alpha +login anonymous +app_update 258550 validate +quit"
        );
    }

    #[test]
    fn test_find_executable_respects_depth() {
        let temp = TempDir::new().unwrap();
        let shallow = temp.path().join("a").join("b");
        std::fs::create_dir_all(&shallow).unwrap();
        std::fs::write(shallow.join("RustDedicated"), "").unwrap();
        assert_eq!(
            find_executable(temp.path(), "RustDedicated"),
            Some(shallow.join("RustDedicated"))
        );

        let other = TempDir::new().unwrap();
        let deep = other.path().join("1").join("2").join("3").join("4");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("RustDedicated"), "").unwrap();
        assert_eq!(find_executable(other.path(), "RustDedicated"), None);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_verification_with_listing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("steamapps")).unwrap();
        let runner = RecordingRunner::default();
        let fetcher = ScriptedFetcher::default();

        let install = NativeInstall {
            runner: &runner,
            fetcher: &fetcher,
            steamcmd: Path::new("/usr/games/steamcmd"),
            downloads_dir: temp.path(),
            home_dir: None,
        };
        let err = install
            .run(&rust_plan(), temp.path(), &noop_line_callback())
            .await
            .unwrap_err();

        match err {
            InstallError::VerificationFailed { listing, .. } => {
                assert_eq!(listing, vec!["steamapps"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_install_streams_lines_and_marks_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let target = temp.path().to_path_buf();
        let binary = target.join("RustDedicated");
        let created = binary.clone();
        let runner = RecordingRunner::with_handler(move |spec| {
            assert_eq!(spec.env, vec![("HOME".to_owned(), "/home/panel".to_owned())]);
            std::fs::write(&created, "").unwrap();
            Ok(ok_output("Update state (0x61) downloading, progress: 10.00\nSuccess! App '258550' fully installed."))
        });
        let fetcher = ScriptedFetcher::default();
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&lines);
        let on_line: LineCallback = Arc::new(move |l: &str| sink.lock().unwrap().push(l.to_owned()));

        let install = NativeInstall {
            runner: &runner,
            fetcher: &fetcher,
            steamcmd: Path::new("/usr/games/steamcmd"),
            downloads_dir: temp.path(),
            home_dir: Some(Path::new("/home/panel")),
        };
        let report = install.run(&rust_plan(), &target, &on_line).await.unwrap();

        assert_eq!(report.executable, Some(binary.clone()));
        let mode = std::fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("fully installed")));
        assert!(lines.last().unwrap().contains("installed OK"));
    }

    #[tokio::test]
    async fn test_steamcmd_failure_is_a_provision_error() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::with_handler(|_| Ok(exit_output(8, "ERROR! Timed out")));
        let fetcher = ScriptedFetcher::default();
        let install = NativeInstall {
            runner: &runner,
            fetcher: &fetcher,
            steamcmd: Path::new("/usr/games/steamcmd"),
            downloads_dir: temp.path(),
            home_dir: None,
        };
        let err = install
            .run(&rust_plan(), temp.path(), &noop_line_callback())
            .await
            .unwrap_err();
        assert_eq!(err.step(), InstallStep::Provision);
    }
}
