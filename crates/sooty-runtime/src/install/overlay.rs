//! Overlay archive extraction.
//!
//! Mod frameworks ship as zip archives laid out relative to the server root.
//! Entries are extracted over the install, replacing existing files.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sooty_core::ports::{InstallError, InstallStep};
use tracing::{debug, warn};

/// Extract `archive` into `target`, returning the number of files written.
pub async fn extract_overlay(archive: &Path, target: &Path) -> Result<usize, InstallError> {
    let archive = archive.to_path_buf();
    let target = target.to_path_buf();
    let join_target = target.clone();
    tokio::task::spawn_blocking(move || extract_blocking(&archive, &target))
        .await
        .map_err(|e| {
            InstallError::io(InstallStep::Overlay, join_target, io::Error::other(e.to_string()))
        })?
}

fn extract_blocking(archive: &Path, target: &Path) -> Result<usize, InstallError> {
    let io_err = |path: &Path, e: io::Error| InstallError::io(InstallStep::Overlay, path, e);

    let file = File::open(archive).map_err(|e| io_err(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| io_err(archive, zip_to_io(e)))?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| io_err(archive, zip_to_io(e)))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "skipping overlay entry outside the target");
            continue;
        };
        let out_path: PathBuf = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| io_err(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| io_err(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| io_err(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| io_err(&out_path, e))?;
        }
        written += 1;
    }
    debug!(archive = %archive.display(), written, "overlay extracted");
    Ok(written)
}

fn zip_to_io(err: zip::result::ZipError) -> io::Error {
    match err {
        zip::result::ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_extract_overwrites_existing_files() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("overlay.zip");
        let target = temp.path().join("server");
        fs::create_dir_all(target.join("RustDedicated_Data/Managed")).unwrap();
        fs::write(target.join("RustDedicated_Data/Managed/Oxide.Core.dll"), "old").unwrap();

        build_zip(
            &archive,
            &[
                ("RustDedicated_Data/Managed/Oxide.Core.dll", "new"),
                ("oxide/config.json", "{}"),
            ],
        );

        let count = extract_overlay(&archive, &target).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(target.join("RustDedicated_Data/Managed/Oxide.Core.dll")).unwrap(),
            "new"
        );
        assert!(target.join("oxide/config.json").is_file());
    }

    #[tokio::test]
    async fn test_extract_skips_escaping_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        let target = temp.path().join("server");
        fs::create_dir_all(&target).unwrap();
        build_zip(&archive, &[("../escaped.txt", "x"), ("ok.txt", "y")]);

        let count = extract_overlay(&archive, &target).await.unwrap();
        assert_eq!(count, 1);
        assert!(!temp.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn test_invalid_archive_is_overlay_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, "not a zip").unwrap();
        let err = extract_overlay(&archive, temp.path()).await.unwrap_err();
        assert_eq!(err.step(), InstallStep::Overlay);
    }
}
