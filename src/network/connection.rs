use crate::network::protocol::Message;
use crate::{FilebenchError, Result};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

/// A stream-channel socket, with or without TLS.
pub enum BenchStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::TlsStream<TcpStream>>),
}

impl AsyncRead for BenchStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BenchStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            BenchStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BenchStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            BenchStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            BenchStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BenchStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            BenchStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BenchStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            BenchStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Length-prefixed message framing over any byte stream.
///
/// Each message is a u32 big-endian length followed by a bincode body. The
/// configured ceiling is enforced in both directions so an oversized single
/// message can never be silently truncated or balloon memory.
pub struct MessageStream<S> {
    stream: S,
    max_message_size: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageStream<S> {
    pub fn new(stream: S, max_message_size: usize) -> Self {
        Self {
            stream,
            max_message_size,
        }
    }

    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        let message_data = bincode::serialize(message)?;

        if message_data.len() > self.max_message_size {
            return Err(FilebenchError::Protocol(format!(
                "Outgoing message of {} bytes exceeds the {} byte limit",
                message_data.len(),
                self.max_message_size
            )));
        }

        let message_len = message_data.len() as u32;
        self.stream.write_all(&message_len.to_be_bytes()).await?;
        self.stream.write_all(&message_data).await?;
        self.stream.flush().await?;

        Ok(())
    }

    pub async fn read_message(&mut self) -> Result<Message> {
        let mut len_bytes = [0u8; 4];
        self.stream
            .read_exact(&mut len_bytes)
            .await
            .map_err(map_read_error)?;
        let message_len = u32::from_be_bytes(len_bytes) as usize;

        if message_len > self.max_message_size {
            return Err(FilebenchError::Protocol(format!(
                "Incoming message of {} bytes exceeds the {} byte limit",
                message_len, self.max_message_size
            )));
        }

        let mut message_data = vec![0u8; message_len];
        self.stream
            .read_exact(&mut message_data)
            .await
            .map_err(map_read_error)?;

        bincode::deserialize(&message_data)
            .map_err(|e| FilebenchError::Protocol(format!("Malformed message: {}", e)))
    }
}

fn map_read_error(e: io::Error) -> FilebenchError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FilebenchError::Protocol("Stream closed mid-message".to_string())
    } else {
        FilebenchError::Io(e)
    }
}
