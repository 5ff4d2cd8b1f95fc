use crate::config::Settings;
use crate::progress::ProgressTracker;
use crate::transport::{file_basename, FileTransport, TransferStats};
use crate::{FilebenchError, Result};
use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::info;

/// Whole-payload upload/download over discrete HTTP exchanges.
///
/// The client tolerates self-signed certificates so HTTPS bases can be
/// benchmarked without certificate setup.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    settings: Arc<Settings>,
}

impl HttpTransport {
    pub fn new(base_url: &str, settings: Arc<Settings>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(settings.network.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            settings,
        })
    }

    fn map_request_error(&self, url: &str, e: reqwest::Error) -> FilebenchError {
        if e.is_timeout() {
            FilebenchError::Timeout(self.settings.network.timeout_seconds)
        } else {
            FilebenchError::Connection(format!("Request to {} failed: {}", url, e))
        }
    }
}

impl FileTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn upload(&self, path: &Path) -> Result<TransferStats> {
        let filename = file_basename(path)?;
        let file = File::open(path).await?;
        let total_size = file.metadata().await?.len();
        let url = format!("{}/upload/{}", self.base_url, filename);

        info!(
            "Uploading {} ({:.1} MB) to {}",
            filename,
            total_size as f64 / (1024.0 * 1024.0),
            url
        );

        let started = Instant::now();
        let body = reqwest::Body::wrap_stream(ReaderStream::with_capacity(
            file,
            self.settings.transfer.chunk_size,
        ));
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, total_size)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(&url, e))?;
        let duration = started.elapsed();

        let status = response.status();
        if !matches!(status.as_u16(), 200 | 201 | 204) {
            let body = response.text().await.unwrap_or_default();
            return Err(FilebenchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Upload complete: status {} ({:.2}s)",
            status.as_u16(),
            duration.as_secs_f64()
        );
        Ok(TransferStats {
            bytes: total_size,
            chunks: 0,
            duration,
        })
    }

    async fn download(&self, filename: &str, output: &Path) -> Result<TransferStats> {
        let url = format!("{}/files/{}", self.base_url, filename);

        info!("Downloading {}", url);

        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_request_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FilebenchError::NotFound(filename.to_string()));
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FilebenchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut file = File::create(output).await?;
        let progress = ProgressTracker::logging(
            self.settings.progress.client_milestone_bytes,
            "Downloaded",
        );
        let mut reader =
            StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        let mut buffer = vec![0u8; self.settings.transfer.http_buffer_size];
        let mut bytes = 0u64;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).await?;
            bytes += n as u64;
            progress.record(n as u64);
        }
        file.flush().await?;
        let duration = started.elapsed();

        info!(
            "Downloaded {:.1} MB in {:.2}s",
            bytes as f64 / (1024.0 * 1024.0),
            duration.as_secs_f64()
        );
        Ok(TransferStats {
            bytes,
            chunks: 0,
            duration,
        })
    }
}
