//! Server records and install plans from CLI input.

use std::path::Path;

use sooty_core::{
    GameKind, InstallPlan, RuntimeFlavor, RuntimeOptions, ServerRecord, VersionSelector,
};

use crate::commands::{PlanArgs, RuntimeArg};
use crate::error::CliError;

/// Read and validate a server record from a JSON file. A record without
/// `base_dir` installs into `<game_root>/<slug>`.
pub fn load_record(path: &Path, game_root: &Path) -> Result<ServerRecord, CliError> {
    let record_error = |reason: String| CliError::Record {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| record_error(e.to_string()))?;
    let record = serde_json::from_str::<ServerRecord>(&raw)
        .map_err(|e| record_error(e.to_string()))?
        .with_default_base_dir(game_root);
    record.validate().map_err(|e| record_error(e.to_string()))?;
    Ok(record)
}

/// Install plan for `record`.
///
/// Rust servers always install natively; Minecraft servers default to
/// Paper. Runtime options fall back to the record's own values.
pub fn build_plan(record: &ServerRecord, args: &PlanArgs) -> Result<InstallPlan, CliError> {
    match record.game {
        GameKind::Rust => {
            if args.runtime.is_some() || args.mc_version.is_some() {
                return Err(CliError::Arguments(
                    "--runtime and --mc-version apply to Minecraft servers only".to_owned(),
                ));
            }
            Ok(InstallPlan::rust_dedicated(args.umod))
        }
        GameKind::Minecraft => {
            if args.umod {
                return Err(CliError::Arguments(
                    "--umod applies to Rust servers only".to_owned(),
                ));
            }
            let flavor = match args.runtime.unwrap_or(RuntimeArg::Paper) {
                RuntimeArg::Paper => RuntimeFlavor::Paper,
                RuntimeArg::Fabric => RuntimeFlavor::Fabric {
                    loader: args.loader.clone().into(),
                    installer: args.fabric_installer.clone().into(),
                },
                RuntimeArg::Forge => RuntimeFlavor::Forge {
                    build: args.forge_build.clone().into(),
                },
            };

            let defaults = RuntimeOptions::default();
            let options = RuntimeOptions {
                ram_mb: args.ram_mb.or(record.ram_mb).unwrap_or(defaults.ram_mb),
                max_players: record.max_players,
                port: record.port,
                motd: args
                    .motd
                    .clone()
                    .or_else(|| record.description.clone())
                    .unwrap_or(defaults.motd),
                jar_name: record.jar_name.clone().unwrap_or(defaults.jar_name),
            };
            Ok(InstallPlan::managed(
                flavor,
                VersionSelector::from(args.mc_version.clone()),
                options,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sooty_core::{ManagedRuntimePlan, Slug};
    use tempfile::TempDir;

    fn minecraft() -> ServerRecord {
        ServerRecord::minecraft(Slug::parse("mc1").unwrap(), "/srv/mc/mc1")
            .with_port(25570)
            .with_max_players(12)
    }

    #[test]
    fn test_load_record_reads_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("alpha.json");
        std::fs::write(
            &path,
            r#"{"slug":"alpha","game":"rust","base_dir":"/srv/rust/alpha","port":28015,"max_players":50}"#,
        )
        .unwrap();

        let record = load_record(&path, Path::new("/srv/games")).unwrap();
        assert_eq!(record.slug.as_str(), "alpha");
        assert_eq!(record.game, GameKind::Rust);
    }

    #[test]
    fn test_load_record_defaults_base_dir_to_game_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mc1.json");
        std::fs::write(
            &path,
            r#"{"slug":"mc1","game":"minecraft","port":25565,"max_players":20}"#,
        )
        .unwrap();

        let record = load_record(&path, Path::new("/srv/games")).unwrap();
        assert_eq!(record.base_dir, Path::new("/srv/games/mc1"));
    }

    #[test]
    fn test_load_record_rejects_invalid_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"slug":"alpha","game":"rust","base_dir":"relative/dir","port":28015,"max_players":50}"#,
        )
        .unwrap();

        let err = load_record(&path, Path::new("/srv/games")).unwrap_err();
        assert!(matches!(err, CliError::Record { .. }));
        assert_eq!(err.exit_code(), 66);
    }

    #[test]
    fn test_rust_plan_with_umod() {
        let record = ServerRecord::rust(Slug::parse("alpha").unwrap(), "/srv/rust/alpha");
        let args = PlanArgs {
            umod: true,
            ..PlanArgs::default()
        };
        assert_eq!(
            build_plan(&record, &args).unwrap(),
            InstallPlan::rust_dedicated(true)
        );
    }

    #[test]
    fn test_rust_plan_rejects_runtime() {
        let record = ServerRecord::rust(Slug::parse("alpha").unwrap(), "/srv/rust/alpha");
        let args = PlanArgs {
            runtime: Some(RuntimeArg::Forge),
            ..PlanArgs::default()
        };
        assert!(matches!(
            build_plan(&record, &args),
            Err(CliError::Arguments(_))
        ));
    }

    #[test]
    fn test_minecraft_plan_defaults_to_paper_with_record_values() {
        let plan = build_plan(&minecraft(), &PlanArgs::default()).unwrap();
        let InstallPlan::ManagedRuntime(ManagedRuntimePlan {
            flavor,
            version,
            options,
        }) = plan
        else {
            panic!("expected a managed plan");
        };
        assert_eq!(flavor, RuntimeFlavor::Paper);
        assert_eq!(version, VersionSelector::Latest);
        assert_eq!(options.port, 25570);
        assert_eq!(options.max_players, 12);
        assert_eq!(options.ram_mb, 2048);
        assert_eq!(options.jar_name, "server.jar");
    }

    #[test]
    fn test_forge_plan_pins_versions() {
        let args = PlanArgs {
            runtime: Some(RuntimeArg::Forge),
            mc_version: Some("1.20.1".to_owned()),
            forge_build: Some("47.2.0".to_owned()),
            ram_mb: Some(6144),
            ..PlanArgs::default()
        };
        let plan = build_plan(&minecraft(), &args).unwrap();
        let InstallPlan::ManagedRuntime(plan) = plan else {
            panic!("expected a managed plan");
        };
        assert_eq!(
            plan.flavor,
            RuntimeFlavor::Forge {
                build: VersionSelector::Pinned("47.2.0".to_owned())
            }
        );
        assert_eq!(plan.version.pinned(), Some("1.20.1"));
        assert_eq!(plan.options.ram_mb, 6144);
    }
}
