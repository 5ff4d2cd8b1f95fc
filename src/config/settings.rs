use crate::{FilebenchError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub network: NetworkSettings,
    pub transfer: TransferSettings,
    pub storage: StorageSettings,
    pub progress: ProgressSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub stream_port: u16,
    pub http_port: u16,
    pub timeout_seconds: u64,
    /// Offer/expect TLS on the stream channel (self-signed, accepted insecurely).
    pub tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Read buffer per streamed chunk on the uploading client.
    pub chunk_size: usize,
    /// Read buffer when the server streams a stored file back.
    pub server_chunk_size: usize,
    /// Copy buffer for HTTP download bodies.
    pub http_buffer_size: usize,
    /// Ceiling for a single framed message on the stream channel.
    pub max_message_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSettings {
    pub client_milestone_bytes: u64,
    pub server_milestone_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: NetworkSettings {
                stream_port: 50051,
                http_port: 8080,
                timeout_seconds: 300,
                tls: true,
            },
            transfer: TransferSettings {
                chunk_size: 1024 * 1024, // 1MB chunks
                server_chunk_size: 4 * 1024 * 1024,
                http_buffer_size: 32 * 1024,
                max_message_size: 500 * 1024 * 1024,
            },
            storage: StorageSettings {
                upload_dir: PathBuf::from("uploads"),
            },
            progress: ProgressSettings {
                client_milestone_bytes: 50 * 1024 * 1024,
                server_milestone_bytes: 10 * 1024 * 1024,
            },
        }
    }
}

impl Settings {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = match config_path {
            Some(path) => PathBuf::from(path),
            None => Self::default_config_path()?,
        };

        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| FilebenchError::Config(format!("Failed to read config: {}", e)))?;

            let settings: Settings = toml::from_str(&content)
                .map_err(|e| FilebenchError::Config(format!("Failed to parse config: {}", e)))?;

            Ok(settings)
        } else {
            let settings = Self::default();
            settings.save(Some(&path))?;
            Ok(settings)
        }
    }

    pub fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FilebenchError::Config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| FilebenchError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&path, content)
            .map_err(|e| FilebenchError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "filebench", "filebench").ok_or_else(|| {
            FilebenchError::Config("Failed to get project directories".to_string())
        })?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn stream_bind_address(&self) -> SocketAddr {
        format!("0.0.0.0:{}", self.network.stream_port).parse().unwrap()
    }

    pub fn http_bind_address(&self) -> SocketAddr {
        format!("0.0.0.0:{}", self.network.http_port).parse().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_benchmark_constants() {
        let settings = Settings::default();
        assert_eq!(settings.network.stream_port, 50051);
        assert_eq!(settings.transfer.chunk_size, 1024 * 1024);
        assert_eq!(settings.transfer.server_chunk_size, 4 * 1024 * 1024);
        assert_eq!(settings.transfer.max_message_size, 500 * 1024 * 1024);
        assert_eq!(settings.progress.client_milestone_bytes, 50 * 1024 * 1024);
        assert_eq!(settings.progress.server_milestone_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn load_creates_default_then_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_string_lossy().to_string();

        let created = Settings::load(Some(&path_str)).unwrap();
        assert!(path.exists());

        let reloaded = Settings::load(Some(&path_str)).unwrap();
        assert_eq!(created.network.stream_port, reloaded.network.stream_port);
        assert_eq!(created.transfer.chunk_size, reloaded.transfer.chunk_size);
    }

    #[test]
    fn save_roundtrips_custom_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.network.stream_port = 4000;
        settings.transfer.chunk_size = 4096;
        settings.save(Some(&path)).unwrap();

        let loaded = Settings::load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(loaded.network.stream_port, 4000);
        assert_eq!(loaded.transfer.chunk_size, 4096);
    }
}
