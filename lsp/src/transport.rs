//! Byte-level duplex channel to a language server.
//!
//! A [`Transport`] splits into a [`TransportReader`] (driven only by the
//! engine's receive loop) and a [`TransportWriter`] (shared by senders behind
//! a lock). Short reads are absorbed here; end-of-stream is reported as
//! [`TransportError::Closed`], distinct from I/O failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
    ReadHalf, WriteHalf,
};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Longest header line [`StreamReader`] accepts before giving up on the stream.
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream closed by peer")]
    Closed,
    #[error("line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read side of a transport.
#[async_trait]
pub trait TransportReader: Send {
    /// Read through the next `\n` (inclusive).
    ///
    /// A final line without terminator is returned as-is; the following call
    /// reports [`TransportError::Closed`]. Implementations may bound the line
    /// length and fail with [`TransportError::LineTooLong`].
    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Read exactly `len` bytes, looping over short reads.
    async fn read_exactly(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;
}

/// Write side of a transport.
#[async_trait]
pub trait TransportWriter: Send {
    /// Write the whole buffer (the implementation loops over partial writes).
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    async fn flush(&mut self) -> Result<(), TransportError>;
}

/// Something that can be split into independently owned read and write halves.
pub trait Transport {
    type Reader: TransportReader + 'static;
    type Writer: TransportWriter + 'static;

    fn into_split(self) -> (Self::Reader, Self::Writer);
}

pub struct StreamReader<R> {
    reader: BufReader<R>,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin> StreamReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_line_bytes: MAX_HEADER_LINE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> TransportReader for StreamReader<R> {
    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let limit = self.max_line_bytes;
        let mut line = Vec::new();
        let bytes_read = (&mut self.reader)
            .take(limit as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if bytes_read == 0 {
            return Err(TransportError::Closed);
        }
        if bytes_read == limit && line.last() != Some(&b'\n') {
            return Err(TransportError::LineTooLong { limit });
        }
        Ok(line)
    }

    async fn read_exactly(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let bytes_read = self.reader.read(&mut buf[filled..]).await?;
            if bytes_read == 0 {
                tracing::debug!("stream ended after {filled} of {len} body bytes");
                return Err(TransportError::Closed);
            }
            filled += bytes_read;
        }
        Ok(buf)
    }
}

pub struct StreamWriter<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> StreamWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> TransportWriter for StreamWriter<W> {
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Transport over any pair of async byte streams.
#[derive(Debug)]
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<S> StreamTransport<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a single bidirectional stream (socket, in-memory duplex).
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self { reader, writer }
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Reader = StreamReader<R>;
    type Writer = StreamWriter<W>;

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        (StreamReader::new(self.reader), StreamWriter::new(self.writer))
    }
}

/// Transport over a child process: we write its stdin and read its stdout.
pub type StdioTransport = StreamTransport<ChildStdout, ChildStdin>;

impl StreamTransport<ChildStdout, ChildStdin> {
    /// Take the piped stdio handles out of a spawned child.
    ///
    /// The child must be spawned with `tokio::process::Command` and piped stdin/stdout.
    pub fn from_child(child: &mut Child) -> Result<Self> {
        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;
        Ok(Self::new(stdout, stdin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn reader_from(mock: tokio_test::io::Mock) -> StreamReader<tokio_test::io::Mock> {
        StreamReader::new(mock)
    }

    #[tokio::test]
    async fn test_read_exactly_assembles_short_reads() {
        let body = vec![b'x'; 200];
        let mock = Builder::new()
            .read(&body[..1])
            .read(&body[1..51])
            .read(&body[51..])
            .build();
        let mut reader = reader_from(mock);
        assert_eq!(reader.read_exactly(200).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_read_exactly_eof_is_closed() {
        let mock = Builder::new().read(b"hello").build();
        let mut reader = reader_from(mock);
        let err = reader.read_exactly(100).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_read_exactly_zero_bytes() {
        let mut reader = reader_from(Builder::new().build());
        assert!(reader.read_exactly(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_line_across_chunks() {
        let mock = Builder::new()
            .read(b"Content-Le")
            .read(b"ngth: 2\r\n\r")
            .read(b"\n")
            .build();
        let mut reader = reader_from(mock);
        assert_eq!(reader.read_line().await.unwrap(), b"Content-Length: 2\r\n");
        assert_eq!(reader.read_line().await.unwrap(), b"\r\n");
        assert!(matches!(
            reader.read_line().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_read_line_unterminated_tail() {
        let mut reader = reader_from(Builder::new().read(b"Content-Length: 10").build());
        assert_eq!(reader.read_line().await.unwrap(), b"Content-Length: 10");
        assert!(matches!(
            reader.read_line().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_read_line_rejects_unterminated_long_line() {
        let mock = Builder::new().read(&[b'x'; 64]).build();
        let mut reader = reader_from(mock).with_max_line_bytes(16);
        assert!(matches!(
            reader.read_line().await,
            Err(TransportError::LineTooLong { limit: 16 })
        ));
    }

    #[tokio::test]
    async fn test_read_line_at_limit_is_accepted() {
        let mock = Builder::new().read(b"0123456789abcde\nrest\n").build();
        let mut reader = reader_from(mock).with_max_line_bytes(16);
        assert_eq!(reader.read_line().await.unwrap(), b"0123456789abcde\n");
        assert_eq!(reader.read_line().await.unwrap(), b"rest\n");
    }

    #[tokio::test]
    async fn test_read_error_is_io() {
        let mock = Builder::new()
            .read_error(std::io::Error::other("boom"))
            .build();
        let mut reader = reader_from(mock);
        assert!(matches!(
            reader.read_line().await,
            Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_writer_buffers_until_flush() {
        let mock = Builder::new().write(b"headerbody").build();
        let mut writer = StreamWriter::new(mock);
        writer.write_bytes(b"header").await.unwrap();
        writer.write_bytes(b"body").await.unwrap();
        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_transport_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let (mut reader, mut writer) = StreamTransport::from_stream(client).into_split();
        let (mut server_reader, mut server_writer) =
            StreamTransport::from_stream(server).into_split();

        writer.write_bytes(b"ping\n").await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(server_reader.read_line().await.unwrap(), b"ping\n");

        server_writer.write_bytes(b"pong\n").await.unwrap();
        server_writer.flush().await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), b"pong\n");
    }
}
