//! Path utilities for engine data directories.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - Layout helpers are pure; only `ensure` touches the filesystem

mod ensure;
mod error;
mod platform;

pub use ensure::{ensure_directory, verify_writable};
pub use error::PathError;
pub use platform::{
    DATA_DIR_ENV, ROOT_UNIT_DIR, data_root, data_root_from, default_game_root, downloads_dir,
    home_dir, install_logs_dir, scripts_dir, staging_dir, user_unit_dir,
};
