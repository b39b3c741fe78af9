//! Managed-runtime (JVM) installs: Paper, Fabric and Forge.
//!
//! Versions are resolved from the distributors' public metadata APIs, the
//! server artifact is downloaded into the target, and the EULA, properties
//! and start script are generated.

use std::path::Path;

use serde_json::Value;
use sooty_core::ports::{
    ArtifactFetcher, CommandRunner, CommandSpec, InstallError, InstallReport, InstallStep,
    LineCallback,
};
use sooty_core::{ManagedRuntimePlan, RuntimeFlavor, VersionSelector};
use tracing::info;

use super::config_files::{render_forge_start_script, render_jar_start_script, write_runtime_files};
use super::deps::{Dependency, ensure_dependency};

pub const PAPER_API: &str = "https://api.papermc.io/v2/projects/paper";
pub const MOJANG_MANIFEST: &str = "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const FABRIC_META: &str = "https://meta.fabricmc.net/v2/versions";
pub const FORGE_PROMOTIONS: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge";

fn metadata_error(what: impl Into<String>, reason: impl Into<String>) -> InstallError {
    InstallError::Metadata {
        what: what.into(),
        reason: reason.into(),
    }
}

/// Last string in `value[key]`, which must be an array.
fn last_string(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_array()?.iter().rev().find_map(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Newest Paper version from project metadata.
pub fn paper_latest_version(project: &Value) -> Result<String, InstallError> {
    last_string(project, "versions")
        .ok_or_else(|| metadata_error("Paper version", "no versions listed"))
}

/// Newest Paper build number from version metadata.
pub fn paper_latest_build(version: &Value) -> Result<String, InstallError> {
    last_string(version, "builds").ok_or_else(|| metadata_error("Paper build", "no builds listed"))
}

/// Artifact file name from build metadata.
pub fn paper_artifact_name(build: &Value) -> Result<String, InstallError> {
    build
        .pointer("/downloads/application/name")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| metadata_error("Paper artifact", "build has no application download"))
}

/// Latest Minecraft release from the launcher manifest.
pub fn minecraft_latest_release(manifest: &Value) -> Result<String, InstallError> {
    manifest
        .pointer("/latest/release")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| metadata_error("Minecraft version", "manifest has no latest release"))
}

/// Preferred entry of a Fabric meta version list: first stable, else first.
pub fn fabric_pick(list: &Value, what: &str) -> Result<String, InstallError> {
    let entries = list
        .as_array()
        .ok_or_else(|| metadata_error(what, "expected a list"))?;
    entries
        .iter()
        .find(|e| e.get("stable").and_then(Value::as_bool) == Some(true))
        .or_else(|| entries.first())
        .and_then(|e| e.get("version"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| metadata_error(what, "no versions listed"))
}

/// Forge build for a Minecraft version: recommended first, then latest.
pub fn forge_promoted_build(promotions: &Value, minecraft: &str) -> Result<String, InstallError> {
    let promos = promotions.get("promos");
    [format!("{minecraft}-recommended"), format!("{minecraft}-latest")]
        .iter()
        .find_map(|key| promos?.get(key)?.as_str().map(str::to_owned))
        .ok_or_else(|| {
            metadata_error(
                "Forge version",
                format!("no promoted build for Minecraft {minecraft}"),
            )
        })
}

pub fn fabric_server_jar_url(minecraft: &str, loader: &str, installer: &str) -> String {
    format!("{FABRIC_META}/loader/{minecraft}/{loader}/{installer}/server/jar")
}

pub fn forge_installer_url(minecraft: &str, forge: &str) -> (String, String) {
    let artifact = format!("{minecraft}-{forge}");
    let jar = format!("forge-{artifact}-installer.jar");
    (format!("{FORGE_MAVEN}/{artifact}/{jar}"), jar)
}

pub struct ManagedInstall<'a> {
    pub runner: &'a dyn CommandRunner,
    pub fetcher: &'a dyn ArtifactFetcher,
}

impl ManagedInstall<'_> {
    async fn json(&self, url: &str) -> Result<Value, InstallError> {
        self.fetcher
            .get_json(url)
            .await
            .map_err(|e| InstallError::fetch(InstallStep::Metadata, e))
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_line: &LineCallback,
    ) -> Result<(), InstallError> {
        self.fetcher
            .download(url, dest, Some(on_line.clone()))
            .await
            .map(|_| ())
            .map_err(|e| InstallError::fetch(InstallStep::Fetch, e))
    }

    async fn minecraft_version(&self, selector: &VersionSelector) -> Result<String, InstallError> {
        match selector.pinned() {
            Some(v) => Ok(v.to_owned()),
            None => minecraft_latest_release(&self.json(MOJANG_MANIFEST).await?),
        }
    }

    pub async fn run(
        &self,
        plan: &ManagedRuntimePlan,
        target: &Path,
        on_line: &LineCallback,
    ) -> Result<InstallReport, InstallError> {
        let (version, start_script) = match &plan.flavor {
            RuntimeFlavor::Paper => (
                self.install_paper(plan, target, on_line).await?,
                render_jar_start_script(&plan.options),
            ),
            RuntimeFlavor::Fabric { loader, installer } => (
                self.install_fabric(plan, loader, installer, target, on_line)
                    .await?,
                render_jar_start_script(&plan.options),
            ),
            RuntimeFlavor::Forge { build } => (
                self.install_forge(plan, build, target, on_line).await?,
                render_forge_start_script(&plan.options),
            ),
        };

        let generated = write_runtime_files(target, &plan.options, &start_script).await?;
        info!(flavor = plan.flavor.label(), %version, "managed runtime installed");
        on_line(&format!(
            "[installer] {} installed OK ({version})",
            plan.flavor.label()
        ));

        Ok(InstallReport {
            target: target.to_path_buf(),
            version: Some(version),
            executable: None,
            generated,
        })
    }

    async fn install_paper(
        &self,
        plan: &ManagedRuntimePlan,
        target: &Path,
        on_line: &LineCallback,
    ) -> Result<String, InstallError> {
        let version = match plan.version.pinned() {
            Some(v) => v.to_owned(),
            None => paper_latest_version(&self.json(PAPER_API).await?)?,
        };
        let version_url = format!("{PAPER_API}/versions/{version}");
        let build = paper_latest_build(&self.json(&version_url).await?)?;
        let build_url = format!("{version_url}/builds/{build}");
        let artifact = paper_artifact_name(&self.json(&build_url).await?)?;
        on_line(&format!("[installer] Paper {version} build {build}"));

        let jar_url = format!("{build_url}/downloads/{artifact}");
        self.download(&jar_url, &target.join(&plan.options.jar_name), on_line)
            .await?;
        Ok(format!("{version} build {build}"))
    }

    async fn install_fabric(
        &self,
        plan: &ManagedRuntimePlan,
        loader: &VersionSelector,
        installer: &VersionSelector,
        target: &Path,
        on_line: &LineCallback,
    ) -> Result<String, InstallError> {
        let minecraft = self.minecraft_version(&plan.version).await?;
        let loader = match loader.pinned() {
            Some(v) => v.to_owned(),
            None => fabric_pick(
                &self.json(&format!("{FABRIC_META}/loader")).await?,
                "Fabric loader version",
            )?,
        };
        let installer = match installer.pinned() {
            Some(v) => v.to_owned(),
            None => fabric_pick(
                &self.json(&format!("{FABRIC_META}/installer")).await?,
                "Fabric installer version",
            )?,
        };
        on_line(&format!(
            "[installer] Fabric for Minecraft {minecraft} (loader {loader}, installer {installer})"
        ));

        let url = fabric_server_jar_url(&minecraft, &loader, &installer);
        self.download(&url, &target.join(&plan.options.jar_name), on_line)
            .await?;
        Ok(format!("MC {minecraft}, loader {loader}"))
    }

    async fn install_forge(
        &self,
        plan: &ManagedRuntimePlan,
        build: &VersionSelector,
        target: &Path,
        on_line: &LineCallback,
    ) -> Result<String, InstallError> {
        let java = ensure_dependency(self.runner, &Dependency::java(), on_line).await?;
        let minecraft = self.minecraft_version(&plan.version).await?;
        let forge = match build.pinned() {
            Some(v) => v.to_owned(),
            None => forge_promoted_build(&self.json(FORGE_PROMOTIONS).await?, &minecraft)?,
        };

        let (url, jar) = forge_installer_url(&minecraft, &forge);
        let installer_path = target.join(&jar);
        self.download(&url, &installer_path, on_line).await?;

        on_line(&format!(
            "[installer] Running Forge installer ({minecraft}-{forge})..."
        ));
        let spec = CommandSpec::new(java.to_string_lossy())
            .arg("-jar")
            .arg(installer_path.to_string_lossy())
            .arg("--installServer")
            .cwd(target)
            .on_line(on_line.clone());
        self.runner
            .run(spec)
            .await
            .map_err(|e| InstallError::command(InstallStep::Provision, e))?;

        Ok(format!("MC {minecraft}, Forge {forge}"))
    }
}
