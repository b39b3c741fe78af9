//! Files generated into managed-runtime installs.
//!
//! All content is rendered with LF line endings so scripts run unchanged on
//! Linux hosts.

use std::path::{Path, PathBuf};

use sooty_core::ports::{InstallError, InstallStep};
use sooty_core::RuntimeOptions;
use tokio::fs;

pub const EULA_FILE: &str = "eula.txt";
pub const PROPERTIES_FILE: &str = "server.properties";
pub const START_SCRIPT: &str = "start.sh";

pub fn render_eula() -> &'static str {
    "eula=true\n"
}

pub fn render_server_properties(options: &RuntimeOptions) -> String {
    let motd = options.motd.replace(['\r', '\n'], " ");
    format!(
        "server-port={}\nmax-players={}\nenable-rcon=false\nmotd={}\n",
        options.port, options.max_players, motd
    )
}

/// Start script that runs a jar directly.
pub fn render_jar_start_script(options: &RuntimeOptions) -> String {
    let ram = options.ram_mb;
    format!(
        "#!/usr/bin/env bash\nset -e\ncd \"$(dirname \"$0\")\"\nexec java -Xms{ram}M -Xmx{ram}M -jar {} nogui\n",
        shell_words::quote(&options.jar_name)
    )
}

/// Start script that prefers the Forge-generated `run.sh`.
pub fn render_forge_start_script(options: &RuntimeOptions) -> String {
    let ram = options.ram_mb;
    format!(
        "#!/usr/bin/env bash\n\
         set -e\n\
         cd \"$(dirname \"$0\")\"\n\
         if [ -f ./run.sh ]; then\n  \
           chmod +x ./run.sh || true\n  \
           exec ./run.sh nogui\n\
         fi\n\
         JAR=\"$(ls -1 forge-*.jar 2>/dev/null | grep -v installer | head -n 1 || true)\"\n\
         if [ -z \"$JAR\" ]; then\n  \
           echo \"[forge] Could not find forge server jar\" >&2\n  \
           exit 1\n\
         fi\n\
         exec java -Xms{ram}M -Xmx{ram}M -jar \"$JAR\" nogui\n"
    )
}

/// Write the EULA, properties and start script; returns the written paths.
pub async fn write_runtime_files(
    target: &Path,
    options: &RuntimeOptions,
    start_script: &str,
) -> Result<Vec<PathBuf>, InstallError> {
    let eula = target.join(EULA_FILE);
    write_file(&eula, render_eula()).await?;

    let properties = target.join(PROPERTIES_FILE);
    write_file(&properties, &render_server_properties(options)).await?;

    let start = target.join(START_SCRIPT);
    write_executable(&start, start_script).await?;

    Ok(vec![eula, properties, start])
}

async fn write_file(path: &Path, contents: &str) -> Result<(), InstallError> {
    fs::write(path, contents)
        .await
        .map_err(|e| InstallError::io(InstallStep::Configure, path, e))
}

/// Write `contents` to `path` and mark it executable (0o755).
pub async fn write_executable(path: &Path, contents: &str) -> Result<(), InstallError> {
    write_file(path, contents).await?;
    set_executable(path).await
}

#[cfg(unix)]
pub async fn set_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| InstallError::io(InstallStep::Configure, path, e))
}

#[cfg(not(unix))]
pub async fn set_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_properties_flatten_motd() {
        let options = RuntimeOptions {
            motd: "hello\nworld".to_owned(),
            port: 25570,
            max_players: 8,
            ..RuntimeOptions::default()
        };
        assert_eq!(
            render_server_properties(&options),
            "server-port=25570\nmax-players=8\nenable-rcon=false\nmotd=hello world\n"
        );
    }

    #[test]
    fn test_jar_start_script() {
        let script = render_jar_start_script(&RuntimeOptions::default());
        assert!(script.starts_with("#!/usr/bin/env bash\nset -e\n"));
        assert!(script.ends_with("exec java -Xms4096M -Xmx4096M -jar server.jar nogui\n"));
        assert!(!script.contains('\r'));
    }

    #[test]
    fn test_forge_start_script_prefers_run_sh() {
        let script = render_forge_start_script(&RuntimeOptions::default());
        assert!(script.contains("if [ -f ./run.sh ]; then\n  chmod +x ./run.sh || true\n  exec ./run.sh nogui\nfi\n"));
        assert!(script.contains("-Xmx4096M"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_runtime_files() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let options = RuntimeOptions::default();
        let written = write_runtime_files(temp.path(), &options, &render_jar_start_script(&options))
            .await
            .unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("eula.txt")).unwrap(),
            "eula=true\n"
        );
        let mode = std::fs::metadata(temp.path().join("start.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
