use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilebenchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("File {0} not found on server")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FilebenchError>;
