//! Install preflight: make sure the target directory is writable.
//!
//! When the directory cannot be written, one repair attempt is made through
//! non-interactive sudo (create the directory, hand it to the engine's user)
//! before giving up with a remediation hint.

use std::path::Path;

use sooty_core::paths::{PathError, ensure_directory, verify_writable};
use sooty_core::ports::{CommandRunner, CommandSpec, InstallError, LineCallback};
use tracing::{info, warn};

const NOT_WRITABLE_HINT: &str = "Use a writable GAME_ROOT (recommended) or fix permissions, \
     e.g. set GAME_ROOT=$HOME/game-servers in .env";

/// Ensure `target` exists and is writable, repairing ownership if possible.
pub async fn prepare_target(
    runner: &dyn CommandRunner,
    target: &Path,
    on_line: &LineCallback,
) -> Result<(), InstallError> {
    let Err(first) = ensure_directory(target) else {
        return Ok(());
    };
    if matches!(first, PathError::NotADirectory(_)) {
        return Err(not_writable(target, &first));
    }

    warn!(target = %target.display(), error = %first, "install target not writable, trying sudo repair");
    on_line(&format!(
        "[installer] No write permission for {}. Trying sudo to create/chown...",
        target.display()
    ));
    repair_ownership(runner, target).await;

    match verify_writable(target) {
        Ok(()) => {
            info!(target = %target.display(), "install target repaired");
            Ok(())
        }
        Err(second) => Err(not_writable(target, &second)),
    }
}

fn not_writable(target: &Path, error: &PathError) -> InstallError {
    let reason = match error {
        PathError::NotWritable { reason, .. } | PathError::CreateFailed { reason, .. } => {
            reason.clone()
        }
        other => other.to_string(),
    };
    InstallError::NotWritable {
        path: target.to_path_buf(),
        reason,
        hint: NOT_WRITABLE_HINT.to_owned(),
    }
}

async fn repair_ownership(runner: &dyn CommandRunner, target: &Path) {
    let dir = target.to_string_lossy().into_owned();
    let mkdir = CommandSpec::new("sudo")
        .args(["-n", "mkdir", "-p"])
        .arg(dir.clone())
        .fail_tolerant();
    if let Err(e) = runner.run(mkdir).await {
        warn!(error = %e, "sudo mkdir could not be run");
        return;
    }

    let chown = CommandSpec::new("sudo")
        .args(["-n", "chown", "-R"])
        .arg(owner_spec())
        .arg(dir)
        .fail_tolerant();
    if let Err(e) = runner.run(chown).await {
        warn!(error = %e, "sudo chown could not be run");
    }
}

/// `uid:gid` of the engine process.
#[cfg(unix)]
fn owner_spec() -> String {
    format!(
        "{}:{}",
        nix::unistd::getuid().as_raw(),
        nix::unistd::getgid().as_raw()
    )
}

#[cfg(not(unix))]
fn owner_spec() -> String {
    String::from("0:0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use sooty_core::noop_line_callback;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writable_target_needs_no_repair() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::default();
        let target = temp.path().join("alpha");

        prepare_target(&runner, &target, &noop_line_callback())
            .await
            .unwrap();

        assert!(target.is_dir());
        assert!(runner.programs().is_empty());
    }

    #[tokio::test]
    async fn test_file_in_the_way_is_not_writable() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::default();
        let target = temp.path().join("alpha");
        std::fs::write(&target, "x").unwrap();

        let err = prepare_target(&runner, &target, &noop_line_callback())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::NotWritable { .. }));
        assert!(err.to_string().contains("GAME_ROOT"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_target_tries_sudo_then_fails() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();
        let target = locked.join("alpha");

        // Root ignores permission bits, so the scenario cannot be reproduced.
        if verify_writable(&locked).is_ok() {
            return;
        }

        let runner = RecordingRunner::default();
        let err = prepare_target(&runner, &target, &noop_line_callback())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::NotWritable { .. }));
        let calls = runner.commands();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("sudo -n mkdir -p"));
        assert!(calls[1].starts_with("sudo -n chown -R"));

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
