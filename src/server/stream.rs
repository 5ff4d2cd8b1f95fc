use crate::config::Settings;
use crate::network::connection::{BenchStream, MessageStream};
use crate::network::protocol::{FileChunk, Message};
use crate::network::tls;
use crate::progress::ProgressTracker;
use crate::{FilebenchError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

/// Accepts framed stream-channel connections and serves uploads/downloads.
pub struct StreamServer {
    settings: Arc<Settings>,
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl StreamServer {
    pub async fn bind(settings: Arc<Settings>) -> Result<Self> {
        let addr = settings.stream_bind_address();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            FilebenchError::Connection(format!("Failed to bind stream listener on {}: {}", addr, e))
        })?;

        let acceptor = if settings.network.tls {
            Some(tls::self_signed_acceptor()?)
        } else {
            None
        };

        info!("Stream listener on {}", listener.local_addr()?);
        Ok(Self {
            settings,
            listener,
            acceptor,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        loop {
            let (socket, addr) = self.listener.accept().await?;
            let settings = self.settings.clone();
            let acceptor = self.acceptor.clone();

            tokio::spawn(async move {
                // A failed stream is fatal only to itself; the listener keeps serving.
                if let Err(e) = handle_connection(socket, acceptor, settings).await {
                    warn!("Stream connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    acceptor: Option<TlsAcceptor>,
    settings: Arc<Settings>,
) -> Result<()> {
    let stream = match acceptor {
        Some(acceptor) => {
            let tls_stream = acceptor.accept(socket).await.map_err(|e| {
                FilebenchError::Connection(format!("TLS handshake failed: {}", e))
            })?;
            BenchStream::Tls(Box::new(tls_stream.into()))
        }
        None => BenchStream::Plain(socket),
    };
    let mut conn = MessageStream::new(stream, settings.transfer.max_message_size);

    match conn.read_message().await? {
        Message::Chunk(first) => handle_upload(&mut conn, first, &settings).await,
        Message::DownloadRequest { filename } => {
            handle_download(&mut conn, &filename, &settings).await
        }
        Message::UploadDone => {
            // A stream that ends before any chunk carries no filename to store.
            conn.write_message(&Message::UploadOutcome {
                message: "Upload contained no chunks".to_string(),
                bytes_received: 0,
            })
            .await
        }
        other => {
            let message = format!("Unexpected opening message: {:?}", other);
            conn.write_message(&Message::ServerError {
                message: message.clone(),
            })
            .await
            .ok();
            Err(FilebenchError::Protocol(message))
        }
    }
}

/// Per-call upload state: created on the first chunk, closed on the end marker.
struct UploadState {
    filename: String,
    path: PathBuf,
    file: File,
    bytes_received: i64,
}

impl UploadState {
    async fn create(
        settings: &Settings,
        chunk: FileChunk,
        progress: &ProgressTracker,
    ) -> Result<Self> {
        // The client-supplied filename is joined as-is; a traversal-style name
        // can escape the upload root (see DESIGN.md).
        let path = settings.storage.upload_dir.join(&chunk.filename);
        let file = File::create(&path).await?;

        info!("Receiving file: {}", chunk.filename);
        let mut state = Self {
            filename: chunk.filename.clone(),
            path,
            file,
            bytes_received: 0,
        };
        state.append(chunk, progress).await?;
        Ok(state)
    }

    async fn append(&mut self, chunk: FileChunk, progress: &ProgressTracker) -> Result<()> {
        if chunk.filename != self.filename {
            return Err(FilebenchError::Protocol(format!(
                "Chunk for {} arrived on a stream receiving {}",
                chunk.filename, self.filename
            )));
        }

        self.file.write_all(&chunk.payload).await?;
        self.bytes_received += chunk.payload.len() as i64;
        progress.record(chunk.payload.len() as u64);
        Ok(())
    }

    async fn finish(mut self) -> Result<(String, PathBuf, i64)> {
        self.file.flush().await?;
        Ok((self.filename, self.path, self.bytes_received))
    }
}

async fn handle_upload<S>(
    conn: &mut MessageStream<S>,
    first: FileChunk,
    settings: &Settings,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let progress =
        ProgressTracker::logging(settings.progress.server_milestone_bytes, "Received");
    let mut state = UploadState::create(settings, first, &progress).await?;

    loop {
        match conn.read_message().await? {
            Message::Chunk(chunk) => state.append(chunk, &progress).await?,
            Message::UploadDone => break,
            other => {
                let message = format!("Unexpected message during upload: {:?}", other);
                conn.write_message(&Message::ServerError {
                    message: message.clone(),
                })
                .await
                .ok();
                return Err(FilebenchError::Protocol(message));
            }
        }
    }

    let (filename, path, bytes_received) = state.finish().await?;
    info!("File saved: {} ({} bytes)", path.display(), bytes_received);

    conn.write_message(&Message::UploadOutcome {
        message: format!("File {} uploaded successfully", filename),
        bytes_received,
    })
    .await
}

async fn handle_download<S>(
    conn: &mut MessageStream<S>,
    filename: &str,
    settings: &Settings,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Download requested for: {}", filename);

    let path = settings.storage.upload_dir.join(filename);
    let mut file = match File::open(&path).await {
        Ok(file) => file,
        Err(_) => {
            // Not-found is a served answer, not a fault of this stream.
            return conn
                .write_message(&Message::NotFound {
                    filename: filename.to_string(),
                })
                .await;
        }
    };

    let progress = ProgressTracker::logging(settings.progress.server_milestone_bytes, "Sent");
    let mut buffer = vec![0u8; settings.transfer.server_chunk_size];
    let mut bytes_sent = 0u64;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }

        let chunk = FileChunk::download(filename, buffer[..n].to_vec());
        conn.write_message(&Message::Chunk(chunk)).await?;
        bytes_sent += n as u64;
        progress.record(n as u64);
    }
    conn.write_message(&Message::DownloadDone).await?;

    info!("Download complete: {} bytes sent", bytes_sent);
    Ok(())
}
