pub mod measurement;

pub use measurement::{speed_mbps, Operation, TransferMeasurement};

use crate::transport::FileTransport;
use crate::Result;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Upload and download measurements for one transport.
#[derive(Debug, Clone)]
pub struct TransportOutcome {
    pub transport: &'static str,
    pub upload: TransferMeasurement,
    pub download: TransferMeasurement,
}

/// Drives upload-then-download through any transport and times each operation.
///
/// Failures become failed measurements carrying the partial elapsed time; the
/// harness itself never aborts a run.
pub struct ThroughputHarness {
    test_file: PathBuf,
    download_filename: String,
    output_dir: PathBuf,
}

impl ThroughputHarness {
    pub fn new(test_file: PathBuf, output_dir: PathBuf) -> Result<Self> {
        let download_filename = crate::transport::file_basename(&test_file)?;
        Ok(Self {
            test_file,
            download_filename,
            output_dir,
        })
    }

    /// Downloads a different stored filename than the uploaded one.
    pub fn with_download_filename(mut self, filename: &str) -> Self {
        self.download_filename = filename.to_string();
        self
    }

    pub async fn run_transport<T: FileTransport>(&self, transport: &T) -> TransportOutcome {
        info!("=== {} upload test ===", transport.name());
        let started = Instant::now();
        let upload = match transport.upload(&self.test_file).await {
            Ok(stats) => {
                let measurement =
                    TransferMeasurement::completed(Operation::Upload, stats.bytes, stats.duration);
                info!(
                    "{} upload: {:.2} MB/s ({:.2}s)",
                    transport.name(),
                    measurement.speed_mbps,
                    measurement.duration.as_secs_f64()
                );
                measurement
            }
            Err(e) => {
                warn!("{} upload failed: {}", transport.name(), e);
                TransferMeasurement::failed(Operation::Upload, started.elapsed(), &e)
            }
        };

        info!("=== {} download test ===", transport.name());
        let output = self
            .output_dir
            .join(format!("downloaded-{}.bin", transport.name()));
        let started = Instant::now();
        let download = match transport
            .download(&self.download_filename, &output)
            .await
        {
            Ok(stats) => {
                let measurement = TransferMeasurement::completed(
                    Operation::Download,
                    stats.bytes,
                    stats.duration,
                );
                info!(
                    "{} download: {:.2} MB/s ({:.2}s)",
                    transport.name(),
                    measurement.speed_mbps,
                    measurement.duration.as_secs_f64()
                );
                measurement
            }
            Err(e) => {
                warn!("{} download failed: {}", transport.name(), e);
                TransferMeasurement::failed(Operation::Download, started.elapsed(), &e)
            }
        };

        if upload.success && download.success {
            self.verify_roundtrip(&output);
        }

        TransportOutcome {
            transport: transport.name(),
            upload,
            download,
        }
    }

    /// Digest comparison is informational; it never affects the measurements.
    fn verify_roundtrip(&self, downloaded: &Path) {
        let uploaded_name = match crate::transport::file_basename(&self.test_file) {
            Ok(name) => name,
            Err(_) => return,
        };
        // Only meaningful when the download fetched the file we just uploaded.
        if uploaded_name != self.download_filename {
            return;
        }

        match (file_digest(&self.test_file), file_digest(downloaded)) {
            (Ok(sent), Ok(received)) if sent == received => {
                debug!("Round-trip digest matches");
            }
            (Ok(sent), Ok(received)) => {
                warn!(
                    "Round-trip digest mismatch: sent {} received {}",
                    sent, received
                );
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Could not verify round-trip digest: {}", e);
            }
        }
    }
}

fn file_digest(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
