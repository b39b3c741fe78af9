//! HTTP artifact fetcher backed by `reqwest`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use sooty_core::ports::{ArtifactFetcher, FetchError, LineCallback};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("sooty-engine/", env!("CARGO_PKG_VERSION"));

/// Fetches metadata and artifacts over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpArtifactFetcher {
    client: Client,
}

impl HttpArtifactFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Stream `url` into `dest` chunk by chunk.
    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        on_line: Option<&LineCallback>,
    ) -> Result<u64, FetchError> {
        let response = self.get(url).await?;
        let total_size = response.content_length();

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let io_err = |source: std::io::Error| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = File::create(dest).await.map_err(io_err)?;

        let mut downloaded: u64 = 0;
        let mut next_report: u64 = REPORT_EVERY_BYTES;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await.map_err(io_err)?;
            downloaded += chunk.len() as u64;

            if downloaded >= next_report {
                next_report += REPORT_EVERY_BYTES;
                if let Some(callback) = on_line {
                    callback(&progress_line(downloaded, total_size));
                }
            }
        }
        file.flush().await.map_err(io_err)?;
        Ok(downloaded)
    }
}

/// Sibling of `dest` that receives the download until it completes.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map_or_else(OsString::new, OsString::from);
    name.push(".part");
    dest.with_file_name(name)
}

/// Emit a progress line roughly every 16 MiB.
const REPORT_EVERY_BYTES: u64 = 16 * 1024 * 1024;

fn progress_line(downloaded: u64, total: Option<u64>) -> String {
    let mib = |bytes: u64| bytes / (1024 * 1024);
    match total {
        Some(total) if total > 0 => format!(
            "[download] {} / {} MiB ({}%)",
            mib(downloaded),
            mib(total),
            downloaded * 100 / total
        ),
        _ => format!("[download] {} MiB", mib(downloaded)),
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        debug!(%url, "fetching metadata");
        let response = self.get(url).await?;
        response.json::<Value>().await.map_err(|e| FetchError::Decode {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_line: Option<LineCallback>,
    ) -> Result<u64, FetchError> {
        if let Some(callback) = &on_line {
            callback(&format!("[installer] Downloading: {url}"));
        }
        info!(%url, dest = %dest.display(), "downloading artifact");

        let partial = partial_path(dest);
        let finished = match self.stream_to_file(url, &partial, on_line.as_ref()).await {
            Ok(bytes) => fs::rename(&partial, dest)
                .await
                .map(|()| bytes)
                .map_err(|source| FetchError::Io {
                    path: dest.to_path_buf(),
                    source,
                }),
            Err(err) => Err(err),
        };

        match finished {
            Ok(bytes) => {
                if let Some(callback) = &on_line {
                    callback(&format!(
                        "[installer] Downloaded {} ({bytes} bytes)",
                        dest.display()
                    ));
                }
                Ok(bytes)
            }
            Err(err) => {
                let _ = fs::remove_file(&partial).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Answer one HTTP request on loopback with `response`.
    async fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/server.jar")
    }

    fn fetcher() -> HttpArtifactFetcher {
        HttpArtifactFetcher::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("/srv/mc1/server.jar")),
            PathBuf::from("/srv/mc1/server.jar.part")
        );
    }

    #[tokio::test]
    async fn test_failed_download_keeps_existing_artifact() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("server.jar");
        std::fs::write(&dest, b"working jar").unwrap();

        let missing = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
        let err = fetcher().download(&missing, &dest, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(std::fs::read(&dest).unwrap(), b"working jar");

        let truncated =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nonly part").await;
        assert!(fetcher().download(&truncated, &dest, None).await.is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"working jar");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_completed_download_replaces_artifact() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("server.jar");
        std::fs::write(&dest, b"old").unwrap();

        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nnew").await;
        let bytes = fetcher().download(&url, &dest, None).await.unwrap();
        assert_eq!(bytes, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_progress_line() {
        let mib = 1024 * 1024;
        assert_eq!(
            progress_line(32 * mib, Some(64 * mib)),
            "[download] 32 / 64 MiB (50%)"
        );
        assert_eq!(progress_line(16 * mib, None), "[download] 16 MiB");
        assert_eq!(progress_line(16 * mib, Some(0)), "[download] 16 MiB");
    }

    #[test]
    fn test_fetcher_builds() {
        assert!(HttpArtifactFetcher::new().is_ok());
    }
}
