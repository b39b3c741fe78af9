//! External tool checks with best-effort auto-install.
//!
//! Tools are located first at their well-known path, then on `PATH`. When a
//! tool is missing and has an apt package, one non-interactive install is
//! attempted before failing with the manual remediation step.

use std::path::{Path, PathBuf};

use sooty_core::ports::{CommandRunner, CommandSpec, InstallError, LineCallback};
use tracing::{debug, warn};

/// A tool an install step needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: &'static str,
    /// Checked before searching `PATH`.
    pub known_path: Option<PathBuf>,
    pub apt_package: Option<&'static str>,
    pub hint: String,
}

impl Dependency {
    pub fn steamcmd(known_path: &Path) -> Self {
        Self {
            name: "steamcmd",
            known_path: Some(known_path.to_path_buf()),
            apt_package: Some("steamcmd"),
            hint: "Install it with: sudo apt-get install steamcmd".to_owned(),
        }
    }

    pub fn java() -> Self {
        Self {
            name: "java",
            known_path: None,
            apt_package: None,
            hint: "Install a Java runtime, e.g. sudo apt-get install openjdk-21-jre-headless"
                .to_owned(),
        }
    }

    fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.known_path {
            if path.is_file() {
                return Some(path.clone());
            }
        }
        which::which(self.name).ok()
    }
}

/// Locate `dep`, installing it through apt if necessary.
pub async fn ensure_dependency(
    runner: &dyn CommandRunner,
    dep: &Dependency,
    on_line: &LineCallback,
) -> Result<PathBuf, InstallError> {
    if let Some(path) = dep.locate() {
        debug!(tool = dep.name, path = %path.display(), "dependency found");
        return Ok(path);
    }

    if let Some(package) = dep.apt_package {
        on_line(&format!(
            "[installer] {} missing. Trying sudo apt-get install {package}...",
            dep.name
        ));
        apt_install(runner, package, on_line).await;
        if let Some(path) = dep.locate() {
            on_line(&format!("[installer] {} installed at {}", dep.name, path.display()));
            return Ok(path);
        }
    }

    Err(InstallError::MissingDependency {
        name: dep.name.to_owned(),
        hint: dep.hint.clone(),
    })
}

/// `sudo` resets the environment, so apt's settings travel through `env`.
fn apt_get(args: &[&str]) -> CommandSpec {
    CommandSpec::new("sudo")
        .args(["-n", "env", "DEBIAN_FRONTEND=noninteractive", "apt-get"])
        .args(args.iter().copied())
}

async fn apt_install(runner: &dyn CommandRunner, package: &str, on_line: &LineCallback) {
    let steps = [apt_get(&["update"]), apt_get(&["install", "-y", package])];
    for spec in steps {
        let spec = spec.on_line(on_line.clone());
        let shown = spec.display();
        if let Err(e) = runner.run(spec).await {
            warn!(command = %shown, error = %e, "auto-install step failed");
            return;
        }
    }
}
