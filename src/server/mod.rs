pub mod http;
pub mod stream;

pub use http::HttpServer;
pub use stream::StreamServer;

use crate::config::Settings;
use crate::{FilebenchError, Result};
use std::sync::Arc;
use tracing::info;

/// Both listeners sharing one upload directory: the stream channel and HTTP.
pub struct TransferServer {
    settings: Arc<Settings>,
}

impl TransferServer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub async fn run(self) -> Result<()> {
        tokio::fs::create_dir_all(&self.settings.storage.upload_dir).await?;
        info!(
            "Upload directory: {}",
            self.settings.storage.upload_dir.display()
        );

        let stream_server = StreamServer::bind(self.settings.clone()).await?;
        let http_server = HttpServer::bind(self.settings.clone()).await?;

        let mut stream_handle = tokio::spawn(stream_server.run());
        let mut http_handle = tokio::spawn(http_server.run());

        // Either listener dying takes the server down; the caller decides
        // whether to restart.
        let result = tokio::select! {
            result = &mut stream_handle => flatten(result, "stream"),
            result = &mut http_handle => flatten(result, "http"),
        };

        stream_handle.abort();
        http_handle.abort();
        result
    }
}

fn flatten(
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
    listener: &str,
) -> Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(FilebenchError::Transfer(format!(
            "{} listener task failed: {}",
            listener, e
        ))),
    }
}
