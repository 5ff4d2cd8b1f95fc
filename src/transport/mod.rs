pub mod http;
pub mod streaming;

pub use http::HttpTransport;
pub use streaming::StreamingTransport;

use crate::{FilebenchError, Result};
use std::path::Path;
use std::time::Duration;

/// Outcome of one completed transfer operation.
#[derive(Debug, Clone, Copy)]
pub struct TransferStats {
    pub bytes: u64,
    /// Protocol-visible chunks moved; zero where the transport has none.
    pub chunks: u64,
    pub duration: Duration,
}

/// The capability set the harness drives: upload a file, download it back.
///
/// Both transports conform; the harness never depends on a concrete one.
#[allow(async_fn_in_trait)]
pub trait FileTransport {
    fn name(&self) -> &'static str;

    async fn upload(&self, path: &Path) -> Result<TransferStats>;

    async fn download(&self, filename: &str, output: &Path) -> Result<TransferStats>;
}

pub(crate) fn file_basename(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| FilebenchError::Transfer(format!("Invalid file path: {}", path.display())))
}
