use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::StreamSource;

/// Default number of bytes requested from the underlying reader per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// A [`StreamSource`] over any tokio reader/writer.
///
/// Serial device files, Unix streams and in-memory duplex pipes all fit. A
/// zero-byte read is end of stream.
#[derive(Debug)]
pub struct IoSource<T> {
    inner: T,
    chunk_size: usize,
    closed: bool,
}

impl<T> IoSource<T> {
    /// Wrap `inner` with the default chunk size.
    pub fn new(inner: T) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap `inner`, reading at most `chunk_size` bytes per chunk.
    pub fn with_chunk_size(inner: T, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
            closed: false,
        }
    }

    /// Maximum bytes per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the source and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> StreamSource for IoSource<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }

        let mut buf = BytesMut::with_capacity(self.chunk_size);
        loop {
            match self.inner.read_buf(&mut buf).await {
                Ok(0) => {
                    debug!("stream reached end");
                    self.closed = true;
                    return Ok(None);
                }
                Ok(n) => {
                    trace!(len = n, "received chunk");
                    return Ok(Some(buf.freeze()));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.inner.shutdown().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}
