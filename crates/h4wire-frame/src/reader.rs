use bytes::{Buf, BytesMut};
use h4wire_transport::StreamSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{FrameError, Result};

const INITIAL_LEFTOVER_CAPACITY: usize = 1024;

/// Exact-length reads over a chunked [`StreamSource`].
///
/// Chunks rarely line up with what a caller wants. Bytes beyond a request are
/// kept and handed out first on the next call, so callers see one contiguous
/// stream regardless of how the transport split it.
///
/// At most one read may be outstanding; `&mut self` enforces that.
#[derive(Debug)]
pub struct BufferedReader<S> {
    source: S,
    leftover: BytesMut,
    cancel: CancellationToken,
}

/// Cancels a [`BufferedReader`] from another task or thread.
///
/// Closing resolves an in-flight read promptly with whatever it had collected
/// and makes every later read return 0.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<S: StreamSource> BufferedReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            leftover: BytesMut::with_capacity(INITIAL_LEFTOVER_CAPACITY),
            cancel: CancellationToken::new(),
        }
    }

    /// Read exactly `length` bytes into `target[offset..offset + length]`.
    ///
    /// Returns the number of bytes copied. Anything less than `length` means
    /// the stream ended or the reader was closed; 0 is the plain close signal.
    /// A request reaching past `target` fails with
    /// [`FrameError::OutOfBounds`] before any bytes move.
    pub async fn read_into(
        &mut self,
        target: &mut [u8],
        offset: usize,
        length: usize,
    ) -> Result<usize> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= target.len())
            .ok_or(FrameError::OutOfBounds {
                offset,
                length,
                capacity: target.len(),
            })?;

        if length == 0 || self.cancel.is_cancelled() {
            return Ok(0);
        }

        let dst = &mut target[offset..end];
        let mut filled = self.leftover.len().min(length);
        dst[..filled].copy_from_slice(&self.leftover[..filled]);
        self.leftover.advance(filled);

        while filled < length {
            debug_assert!(self.leftover.is_empty());

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(filled, length, "read cancelled");
                    None
                }
                chunk = self.source.next_chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                trace!(filled, length, "stream ended before request was satisfied");
                break;
            };

            let take = chunk.len().min(length - filled);
            dst[filled..filled + take].copy_from_slice(&chunk[..take]);
            filled += take;
            if take < chunk.len() {
                self.leftover.extend_from_slice(&chunk[take..]);
            }
        }

        Ok(filled)
    }

    /// Number of received bytes not yet handed to a caller.
    pub fn buffered(&self) -> usize {
        self.leftover.len()
    }

    /// Handle that can close this reader while a read is in flight.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            token: self.cancel.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel reads, drop buffered bytes and close the source.
    ///
    /// The reader must not be reused; every later read returns 0.
    pub async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.leftover.clear();
        self.source.close().await?;
        Ok(())
    }

    /// Borrow the source, e.g. to write to the link between reads.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader and return the source. Buffered bytes are lost.
    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use h4wire_transport::{ChunkChannel, TransportError};
    use proptest::prelude::*;

    use super::*;

    /// Source that replays fixed chunks and counts pulls.
    #[derive(Debug)]
    struct ScriptedSource {
        chunks: Vec<Bytes>,
        pulls: Arc<AtomicUsize>,
        closed: bool,
    }

    impl ScriptedSource {
        fn new<T: AsRef<[u8]>>(chunks: &[T]) -> (Self, Arc<AtomicUsize>) {
            let pulls = Arc::new(AtomicUsize::new(0));
            let source = Self {
                chunks: chunks
                    .iter()
                    .rev()
                    .map(|c| Bytes::copy_from_slice(c.as_ref()))
                    .collect(),
                pulls: Arc::clone(&pulls),
                closed: false,
            };
            (source, pulls)
        }
    }

    impl StreamSource for ScriptedSource {
        fn next_chunk(
            &mut self,
        ) -> impl Future<Output = h4wire_transport::Result<Option<Bytes>>> + Send {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            let next = if self.closed { None } else { self.chunks.pop() };
            async move { Ok(next) }
        }

        fn write(&mut self, _bytes: &[u8]) -> impl Future<Output = h4wire_transport::Result<()>> + Send {
            async { Ok(()) }
        }

        fn close(&mut self) -> impl Future<Output = h4wire_transport::Result<()>> + Send {
            self.closed = true;
            async { Ok(()) }
        }
    }

    /// Source whose first pull fails.
    struct FailingSource;

    impl StreamSource for FailingSource {
        async fn next_chunk(&mut self) -> h4wire_transport::Result<Option<Bytes>> {
            Err(TransportError::Io(std::io::Error::other("uart framing error")))
        }

        async fn write(&mut self, _bytes: &[u8]) -> h4wire_transport::Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> h4wire_transport::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn excess_bytes_carry_over() {
        let (source, pulls) = ScriptedSource::new(&["abcdef"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 8];

        assert_eq!(reader.read_into(&mut buf, 0, 2).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(reader.buffered(), 4);

        assert_eq!(reader.read_into(&mut buf, 2, 4).await.unwrap(), 4);
        assert_eq!(&buf[..6], b"abcdef");
        assert_eq!(reader.buffered(), 0);
        assert_eq!(pulls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn leftover_satisfies_without_io() {
        let (source, pulls) = ScriptedSource::new(&["0123456789"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 10];

        reader.read_into(&mut buf, 0, 1).await.unwrap();
        assert_eq!(pulls.load(Ordering::SeqCst), 1);

        reader.read_into(&mut buf, 1, 3).await.unwrap();
        reader.read_into(&mut buf, 4, 6).await.unwrap();
        assert_eq!(pulls.load(Ordering::SeqCst), 1);
        assert_eq!(&buf, b"0123456789");
    }

    #[tokio::test]
    async fn request_spans_many_chunks() {
        let (source, pulls) = ScriptedSource::new(&["a", "bc", "", "def", "gh"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 7];

        assert_eq!(reader.read_into(&mut buf, 0, 7).await.unwrap(), 7);
        assert_eq!(&buf, b"abcdefg");
        assert_eq!(reader.buffered(), 1);
        assert_eq!(pulls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn zero_length_read_does_no_io() {
        let (source, pulls) = ScriptedSource::new(&["abc"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 4];

        assert_eq!(reader.read_into(&mut buf, 4, 0).await.unwrap(), 0);
        assert_eq!(pulls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_bounds_fails_before_io() {
        let (source, pulls) = ScriptedSource::new(&["abcdef"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 4];

        let err = reader.read_into(&mut buf, 2, 3).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::OutOfBounds {
                offset: 2,
                length: 3,
                capacity: 4
            }
        ));
        assert_eq!(pulls.load(Ordering::SeqCst), 0);

        let err = reader.read_into(&mut buf, usize::MAX, 2).await.unwrap_err();
        assert!(matches!(err, FrameError::OutOfBounds { .. }));
    }

    #[tokio::test]
    async fn end_of_stream_reports_short_count() {
        let (source, _pulls) = ScriptedSource::new(&["xy"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 8];

        assert_eq!(reader.read_into(&mut buf, 0, 5).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"xy");
        assert_eq!(reader.read_into(&mut buf, 0, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mut reader = BufferedReader::new(FailingSource);
        let mut buf = [0u8; 1];
        let err = reader.read_into(&mut buf, 0, 1).await.unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn close_handle_cancels_pending_read() {
        let (tx, source) = ChunkChannel::new(4);
        let mut reader = BufferedReader::new(source);
        let handle = reader.close_handle();

        tx.push(&b"ab"[..]).await.unwrap();

        let task = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            let n = reader.read_into(&mut buf, 0, 8).await.unwrap();
            (n, buf, reader)
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.close();

        let (n, buf, mut reader) = task.await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"ab");
        assert!(handle.is_closed());

        let mut buf = [0u8; 1];
        assert_eq!(reader.read_into(&mut buf, 0, 1).await.unwrap(), 0);
        drop(tx);
    }

    #[tokio::test]
    async fn close_releases_source_and_discards_leftover() {
        let (source, _pulls) = ScriptedSource::new(&["abc", "def"]);
        let mut reader = BufferedReader::new(source);
        let mut buf = [0u8; 4];

        reader.read_into(&mut buf, 0, 1).await.unwrap();
        reader.close().await.unwrap();

        assert!(reader.is_closed());
        assert_eq!(reader.buffered(), 0);
        assert_eq!(reader.read_into(&mut buf, 0, 1).await.unwrap(), 0);
        assert!(reader.into_inner().closed);
    }

    #[tokio::test]
    async fn split_reads_equal_one_read() {
        let data = b"hello, controller";
        let (source, _) = ScriptedSource::new(&[data]);
        let mut split = BufferedReader::new(source);
        let mut a = [0u8; 17];
        split.read_into(&mut a, 0, 6).await.unwrap();
        split.read_into(&mut a, 6, 11).await.unwrap();

        let (source, _) = ScriptedSource::new(&[data]);
        let mut whole = BufferedReader::new(source);
        let mut b = [0u8; 17];
        whole.read_into(&mut b, 0, 17).await.unwrap();

        assert_eq!(a, b);
    }

    fn segment(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
        let mut points: Vec<usize> = cuts.iter().map(|c| c % (data.len() + 1)).collect();
        points.push(0);
        points.push(data.len());
        points.sort_unstable();
        points.windows(2).map(|w| data[w[0]..w[1]].to_vec()).collect()
    }

    fn read_all(chunks: Vec<Vec<u8>>, requests: &[usize], total: usize) -> Vec<u8> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let (source, _) = ScriptedSource::new(&chunks);
            let mut reader = BufferedReader::new(source);
            let mut buf = vec![0u8; total];
            let mut offset = 0;
            for &len in requests {
                let n = reader.read_into(&mut buf, offset, len).await.unwrap();
                assert_eq!(n, len);
                offset += n;
            }
            buf
        })
    }

    proptest! {
        #[test]
        fn chunking_never_changes_delivered_bytes(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            cuts in proptest::collection::vec(any::<usize>(), 0..16),
            request_cuts in proptest::collection::vec(any::<usize>(), 0..8),
        ) {
            let requests: Vec<usize> = segment(&data, &request_cuts)
                .iter()
                .map(Vec::len)
                .collect();

            let segmented = read_all(segment(&data, &cuts), &requests, data.len());
            let single_bytes = read_all(data.iter().map(|b| vec![*b]).collect(), &requests, data.len());
            let one_chunk = read_all(vec![data.clone()], &requests, data.len());

            prop_assert_eq!(&segmented, &data);
            prop_assert_eq!(&single_bytes, &data);
            prop_assert_eq!(&one_chunk, &data);
        }
    }
}
