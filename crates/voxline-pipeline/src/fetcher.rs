//! Streaming download of remote recordings.

use crate::error::PipelineError;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Default cap on a downloaded recording (10 MiB), matching the STT input
/// limit so an accepted download can always be transcribed.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Fetches a remote recording into a local file.
#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    /// Streams the payload at `url` into `dest`.
    ///
    /// On error, no partial file remains at `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), PipelineError>;
}

/// HTTP fetcher that streams the response body to disk chunk by chunk,
/// never buffering the full payload in memory.
#[derive(Debug, Clone)]
pub struct HttpAudioFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpAudioFetcher {
    pub fn new(client: reqwest::Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Download(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Download(format!(
                "recording fetch returned {}",
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(PipelineError::Download(format!(
                    "recording too large: {len} bytes (limit: {} bytes)",
                    self.max_bytes
                )));
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| PipelineError::Download(format!("failed to create temp file: {e}")))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| PipelineError::Download(format!("stream read failed: {e}")))?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(PipelineError::Download(format!(
                    "recording too large: exceeded {} bytes mid-stream",
                    self.max_bytes
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::Download(format!("temp file write failed: {e}")))?;
        }

        file.flush()
            .await
            .map_err(|e| PipelineError::Download(format!("temp file flush failed: {e}")))?;

        Ok(written)
    }
}

#[async_trait]
impl RecordingFetcher for HttpAudioFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), PipelineError> {
        match self.stream_to_file(url, dest).await {
            Ok(bytes) => {
                debug!(url, dest = %dest.display(), bytes, "downloaded recording");
                Ok(())
            }
            Err(e) => {
                // No partial file may remain referenced after a failed fetch.
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tempfile::TempDir;

    /// Serves fixed routes on an ephemeral port and returns its base URL.
    async fn serve_fixture() -> String {
        let app = Router::new()
            .route("/rec.wav", get(|| async { b"RIFFfake-wav-bytes".to_vec() }))
            .route(
                "/missing.wav",
                get(|| async { (axum::http::StatusCode::NOT_FOUND, "gone") }),
            )
            .route("/big.wav", get(|| async { vec![0u8; 4096] }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fetcher(max_bytes: u64) -> HttpAudioFetcher {
        HttpAudioFetcher::new(reqwest::Client::new(), max_bytes)
    }

    #[tokio::test]
    async fn fetch_streams_payload_to_dest() {
        let base = serve_fixture().await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("s-1.wav");

        fetcher(DEFAULT_MAX_DOWNLOAD_BYTES)
            .fetch(&format!("{base}/rec.wav"), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"RIFFfake-wav-bytes");
    }

    #[tokio::test]
    async fn non_success_status_is_a_download_error() {
        let base = serve_fixture().await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("s-1.wav");

        let err = fetcher(DEFAULT_MAX_DOWNLOAD_BYTES)
            .fetch(&format!("{base}/missing.wav"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Download(_)));
        assert!(!dest.exists(), "no partial file may remain");
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_and_partial_file_removed() {
        let base = serve_fixture().await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("s-1.wav");

        let err = fetcher(1024)
            .fetch(&format!("{base}/big.wav"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Download(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_download_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("s-1.wav");

        // Reserved TEST-NET address; nothing listens there.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let err = HttpAudioFetcher::new(client, DEFAULT_MAX_DOWNLOAD_BYTES)
            .fetch("http://192.0.2.1:9/rec.wav", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Download(_)));
    }
}
