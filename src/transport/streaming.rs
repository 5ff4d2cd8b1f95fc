use crate::config::Settings;
use crate::network::connection::{BenchStream, MessageStream};
use crate::network::protocol::{FileChunk, Message};
use crate::network::tls;
use crate::progress::ProgressTracker;
use crate::transport::{file_basename, FileTransport, TransferStats};
use crate::{FilebenchError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Chunked upload/download over one persistent framed connection.
pub struct StreamingTransport {
    addr: String,
    settings: Arc<Settings>,
}

impl StreamingTransport {
    pub fn new(addr: impl Into<String>, settings: Arc<Settings>) -> Self {
        Self {
            addr: addr.into(),
            settings,
        }
    }

    async fn connect(&self) -> Result<MessageStream<BenchStream>> {
        let tcp = TcpStream::connect(&self.addr).await.map_err(|e| {
            FilebenchError::Connection(format!("Failed to connect to {}: {}", self.addr, e))
        })?;

        let stream = if self.settings.network.tls {
            let host = self.addr.split(':').next().unwrap_or("localhost").to_string();
            let server_name = rustls::pki_types::ServerName::try_from(host).map_err(|e| {
                FilebenchError::Connection(format!("Invalid server name: {}", e))
            })?;
            let tls_stream = tls::insecure_connector()
                .connect(server_name, tcp)
                .await
                .map_err(|e| {
                    FilebenchError::Connection(format!(
                        "TLS handshake with {} failed: {}",
                        self.addr, e
                    ))
                })?;
            BenchStream::Tls(Box::new(tls_stream.into()))
        } else {
            BenchStream::Plain(tcp)
        };

        Ok(MessageStream::new(
            stream,
            self.settings.transfer.max_message_size,
        ))
    }

    async fn upload_inner(&self, path: &Path) -> Result<TransferStats> {
        let filename = file_basename(path)?;
        let mut file = File::open(path).await?;
        let total_size = file.metadata().await?.len();

        info!(
            "Uploading {} ({:.1} MB) over the stream channel",
            filename,
            total_size as f64 / (1024.0 * 1024.0)
        );

        let mut conn = self.connect().await?;
        let progress = ProgressTracker::logging(
            self.settings.progress.client_milestone_bytes,
            "Uploaded",
        );
        let mut buffer = vec![0u8; self.settings.transfer.chunk_size];
        let mut chunks = 0u64;

        let started = Instant::now();
        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                // An empty file still has to announce its filename to the server.
                if chunks == 0 {
                    let chunk = FileChunk::upload(&filename, Vec::new(), total_size as i64);
                    conn.write_message(&Message::Chunk(chunk)).await?;
                    chunks += 1;
                }
                break;
            }

            let chunk = FileChunk::upload(&filename, buffer[..n].to_vec(), total_size as i64);
            conn.write_message(&Message::Chunk(chunk)).await?;
            chunks += 1;
            progress.record(n as u64);
        }
        conn.write_message(&Message::UploadDone).await?;

        let (reply, bytes_received) = match conn.read_message().await? {
            Message::UploadOutcome {
                message,
                bytes_received,
            } => (message, bytes_received),
            Message::ServerError { message } => return Err(FilebenchError::Protocol(message)),
            other => {
                return Err(FilebenchError::Protocol(format!(
                    "Unexpected reply to upload: {:?}",
                    other
                )))
            }
        };
        let duration = started.elapsed();

        debug!("Server reply: {}", reply);
        if bytes_received != total_size as i64 {
            return Err(FilebenchError::Transfer(format!(
                "Server received {} bytes, expected {}",
                bytes_received, total_size
            )));
        }

        info!(
            "Upload complete: {} bytes in {} chunks ({:.2}s)",
            total_size,
            chunks,
            duration.as_secs_f64()
        );
        Ok(TransferStats {
            bytes: total_size,
            chunks,
            duration,
        })
    }

    async fn download_inner(&self, filename: &str, output: &Path) -> Result<TransferStats> {
        info!("Downloading {} over the stream channel", filename);

        let mut conn = self.connect().await?;
        let progress = ProgressTracker::logging(
            self.settings.progress.client_milestone_bytes,
            "Downloaded",
        );

        let started = Instant::now();
        conn.write_message(&Message::DownloadRequest {
            filename: filename.to_string(),
        })
        .await?;

        let mut file = File::create(output).await?;
        let mut bytes = 0u64;
        let mut chunks = 0u64;

        loop {
            match conn.read_message().await? {
                Message::Chunk(chunk) => {
                    file.write_all(&chunk.payload).await?;
                    bytes += chunk.payload.len() as u64;
                    chunks += 1;
                    progress.record(chunk.payload.len() as u64);
                }
                Message::DownloadDone => break,
                Message::NotFound { filename } => {
                    return Err(FilebenchError::NotFound(filename))
                }
                Message::ServerError { message } => {
                    return Err(FilebenchError::Protocol(message))
                }
                other => {
                    return Err(FilebenchError::Protocol(format!(
                        "Unexpected message during download: {:?}",
                        other
                    )))
                }
            }
        }
        let duration = started.elapsed();
        file.flush().await?;

        info!(
            "Downloaded {:.1} MB in {:.2}s",
            bytes as f64 / (1024.0 * 1024.0),
            duration.as_secs_f64()
        );
        Ok(TransferStats {
            bytes,
            chunks,
            duration,
        })
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.settings.network.timeout_seconds)
    }
}

impl FileTransport for StreamingTransport {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn upload(&self, path: &Path) -> Result<TransferStats> {
        tokio::time::timeout(self.deadline(), self.upload_inner(path))
            .await
            .map_err(|_| FilebenchError::Timeout(self.settings.network.timeout_seconds))?
    }

    async fn download(&self, filename: &str, output: &Path) -> Result<TransferStats> {
        tokio::time::timeout(self.deadline(), self.download_inner(filename, output))
            .await
            .map_err(|_| FilebenchError::Timeout(self.settings.network.timeout_seconds))?
    }
}
