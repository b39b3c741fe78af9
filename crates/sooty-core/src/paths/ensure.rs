//! Directory creation and verification utilities.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::error::PathError;

/// Create `path` if missing, then check that it is writable.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.as_os_str().is_empty() {
        return Err(PathError::EmptyPath);
    }
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
    } else {
        fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "created directory");
    }

    verify_writable(path)
}

/// Verify a directory is writable by creating and removing a marker file.
///
/// The marker name is unique per process and call, so concurrent checks of
/// the same directory do not interfere.
pub fn verify_writable(path: &Path) -> Result<(), PathError> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    let test_file = path.join(format!(".sooty_write_test_{}_{nanos}", process::id()));
    let result = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&test_file);

    match result {
        Ok(mut file) => {
            let written = file.write_all(b"test");
            drop(file);
            let _ = fs::remove_file(&test_file);
            written.map_err(|e| PathError::NotWritable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
        Err(err) => Err(PathError::NotWritable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directory_creates_missing() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_directory_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        let result = ensure_directory(&file);
        assert!(matches!(result, Err(PathError::NotADirectory(_))));
    }

    #[test]
    fn test_verify_writable_leaves_no_marker() {
        let temp = TempDir::new().unwrap();
        verify_writable(temp.path()).unwrap();
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_verify_writable_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let result = verify_writable(&temp.path().join("nope"));
        assert!(matches!(result, Err(PathError::NotWritable { .. })));
    }
}
