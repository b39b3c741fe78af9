//! Artifact fetcher port: JSON metadata lookups and file downloads.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::LineCallback;

/// Errors raised while talking to a metadata API or download host.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fetches remote metadata and artifacts.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// GET `url` and decode the body as JSON.
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;

    /// Stream `url` to `dest`, returning the number of bytes written.
    ///
    /// A partially written file is removed on failure.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_line: Option<LineCallback>,
    ) -> Result<u64, FetchError>;
}
