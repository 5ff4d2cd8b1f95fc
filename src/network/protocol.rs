use serde::{Deserialize, Serialize};

/// Placeholder total size on download chunks, where the total is not declared.
pub const SIZE_UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChunk {
    pub filename: String,
    pub payload: Vec<u8>,
    pub total_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // One bounded slice of file bytes, in either direction
    Chunk(FileChunk),

    // Upload control
    UploadDone,
    UploadOutcome {
        message: String,
        bytes_received: i64,
    },

    // Download control
    DownloadRequest {
        filename: String,
    },
    DownloadDone,
    NotFound {
        filename: String,
    },

    // The server aborted this stream
    ServerError {
        message: String,
    },
}

impl FileChunk {
    pub fn upload(filename: &str, payload: Vec<u8>, total_size: i64) -> Self {
        Self {
            filename: filename.to_string(),
            payload,
            total_size,
        }
    }

    pub fn download(filename: &str, payload: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            payload,
            total_size: SIZE_UNKNOWN,
        }
    }
}
