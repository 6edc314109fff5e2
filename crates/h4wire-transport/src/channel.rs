use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::StreamSource;

/// A [`StreamSource`] fed by a host that pushes chunks explicitly.
///
/// This is the integration point for runtimes that own the physical link
/// and hand received buffers over (for example a browser serial port bridged
/// into the process). The stream ends once every [`ChunkSender`] is dropped
/// or finished and all queued chunks have been consumed.
#[derive(Debug)]
pub struct ChunkChannel {
    rx: mpsc::Receiver<Bytes>,
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
    closed: bool,
}

/// Producer half of a [`ChunkChannel`].
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Bytes>,
}

impl ChunkChannel {
    /// Create a channel buffering up to `capacity` undelivered chunks.
    pub fn new(capacity: usize) -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            ChunkSender { tx },
            Self {
                rx,
                outbound: None,
                closed: false,
            },
        )
    }

    /// Forward bytes written to this source to `outbound`.
    ///
    /// Without an outbound sink, writes fail with `Unsupported`.
    pub fn with_outbound(mut self, outbound: mpsc::UnboundedSender<Bytes>) -> Self {
        self.outbound = Some(outbound);
        self
    }
}

impl ChunkSender {
    /// Push a chunk, waiting for queue space.
    pub async fn push(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(chunk.into())
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Push a chunk without waiting. Fails if the queue is full or closed.
    pub fn try_push(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.tx.try_send(chunk.into()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "chunk queue full",
            )),
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Signal end of stream from this sender.
    pub fn finish(self) {
        drop(self);
    }

    /// Whether the receiving source has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl StreamSource for ChunkChannel {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let outbound = self.outbound.as_ref().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "chunk channel has no outbound sink",
            ))
        })?;
        outbound
            .send(Bytes::copy_from_slice(bytes))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            debug!("closing chunk channel");
            self.closed = true;
            self.rx.close();
        }
        Ok(())
    }
}
