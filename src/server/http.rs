use crate::config::Settings;
use crate::progress::ProgressTracker;
use crate::{FilebenchError, Result};
use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    settings: Arc<Settings>,
}

/// Serves `PUT /upload/{filename}` and `GET /files/{filename}`.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    pub async fn bind(settings: Arc<Settings>) -> Result<Self> {
        let addr = settings.http_bind_address();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            FilebenchError::Connection(format!("Failed to bind HTTP listener on {}: {}", addr, e))
        })?;

        info!("HTTP listener on {}", listener.local_addr()?);

        let router = Router::new()
            .route("/upload/{filename}", put(upload_file))
            .route("/files/{filename}", get(download_file))
            .layer(TraceLayer::new_for_http())
            .with_state(HttpState { settings });

        Ok(Self { listener, router })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .await
            .map_err(FilebenchError::Io)
    }
}

async fn upload_file(
    State(state): State<HttpState>,
    UrlPath(filename): UrlPath<String>,
    body: Body,
) -> std::result::Result<StatusCode, (StatusCode, String)> {
    let path = state.settings.storage.upload_dir.join(&filename);
    info!("Receiving file: {}", filename);

    let mut file = File::create(&path).await.map_err(|e| {
        internal(format!("Failed to create {}: {}", path.display(), e))
    })?;

    let progress = ProgressTracker::logging(
        state.settings.progress.server_milestone_bytes,
        "Received",
    );
    let mut stream = body.into_data_stream();
    let mut total = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {}", e),
            )
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| internal(format!("Failed to write chunk: {}", e)))?;
        total += chunk.len() as u64;
        progress.record(chunk.len() as u64);
    }
    file.flush()
        .await
        .map_err(|e| internal(format!("Failed to flush file: {}", e)))?;

    info!("File saved: {} ({} bytes)", path.display(), total);
    Ok(StatusCode::CREATED)
}

async fn download_file(
    State(state): State<HttpState>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    info!("Download requested for: {}", filename);

    let path = state.settings.storage.upload_dir.join(&filename);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                format!("File {} not found", filename),
            )
                .into_response();
        }
    };

    let size = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => return internal(format!("Failed to stat {}: {}", path.display(), e)).into_response(),
    };

    let progress = Arc::new(ProgressTracker::logging(
        state.settings.progress.server_milestone_bytes,
        "Sent",
    ));
    let stream = ReaderStream::with_capacity(file, state.settings.transfer.server_chunk_size)
        .inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                progress.record(chunk.len() as u64);
            }
        });

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

fn internal(message: String) -> (StatusCode, String) {
    error!("{}", message);
    (StatusCode::INTERNAL_SERVER_ERROR, message)
}
