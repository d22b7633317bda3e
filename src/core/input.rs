//! Byte stream abstraction for object bodies.
//!
//! Scanners consume an object as a `ByteStream`, an owned async reader, so
//! objects never have to be materialized in memory.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

/// An owned async byte stream for one object body.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Wraps in-memory bytes into a `ByteStream`.
pub fn byte_stream_from_bytes(data: impl Into<Vec<u8>>) -> ByteStream {
    Box::new(std::io::Cursor::new(data.into()))
}

pin_project! {
    /// A reader that hands out data in fixed chunks, optionally failing
    /// once every chunk has been read.
    ///
    /// Each `poll_read` returns at most one chunk, so chunk boundaries are
    /// visible to the consumer the way network reads would be.
    pub struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
        offset: usize,
        failure: Option<std::io::Error>,
    }
}

impl ChunkedReader {
    /// Creates a reader yielding the given chunks in order.
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().filter(|c| !c.is_empty()).collect(),
            offset: 0,
            failure: None,
        }
    }

    /// Splits `data` into chunks of at most `chunk_size` bytes.
    pub fn split(data: &[u8], chunk_size: usize) -> Self {
        Self::new(data.chunks(chunk_size.max(1)).map(<[u8]>::to_vec))
    }

    /// Fails with `error` after the chunks are exhausted instead of
    /// reporting end-of-stream.
    pub fn with_failure(mut self, error: std::io::Error) -> Self {
        self.failure = Some(error);
        self
    }
}

impl std::fmt::Debug for ChunkedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedReader")
            .field("chunks_left", &self.chunks.len())
            .field("fails", &self.failure.is_some())
            .finish()
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();

        if let Some(chunk) = this.chunks.front() {
            let remaining = &chunk[*this.offset..];
            let to_copy = std::cmp::min(buf.remaining(), remaining.len());
            buf.put_slice(&remaining[..to_copy]);
            *this.offset += to_copy;
            if *this.offset == chunk.len() {
                this.chunks.pop_front();
                *this.offset = 0;
            }
            return Poll::Ready(Ok(()));
        }

        match this.failure.take() {
            Some(err) => Poll::Ready(Err(err)),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_chunked_reader_yields_chunks() {
        let mut reader = ChunkedReader::split(b"hello world", 4);
        let mut buf = [0u8; 64];

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hell");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"o world");
    }

    #[tokio::test]
    async fn test_chunked_reader_failure_after_data() {
        let mut reader = ChunkedReader::new([b"abc".to_vec()]).with_failure(
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away"),
        );

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(out, b"abc");
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
        assert_eq!(err.to_string(), "peer went away");
    }

    #[tokio::test]
    async fn test_byte_stream_from_bytes() {
        let mut stream = byte_stream_from_bytes(b"data".to_vec());
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"data");
    }
}
