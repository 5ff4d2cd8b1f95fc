pub mod connection;
pub mod protocol;
pub mod tls;

pub use connection::{BenchStream, MessageStream};
pub use protocol::{FileChunk, Message};
