use h4wire_transport::StreamSource;
use tracing::{debug, trace, warn};

use crate::dispatch::Dispatcher;
use crate::error::{FrameError, ReadStage, Result};
use crate::packet::{Direction, Packet, MAX_HEADER_TAIL_LEN, MAX_PACKET_SIZE, PACKET_TYPE_LEN};
use crate::reader::BufferedReader;

/// Counters kept over the life of a parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Complete packets assembled.
    pub packets: u64,
    /// Bytes discarded because they could not start a packet.
    pub skipped_bytes: u64,
}

/// Delimits H4 packets on a byte stream.
///
/// Each packet is assembled in one reusable buffer: type byte at offset 0,
/// header tail right after it, then the payload whose length the tail
/// announces. A byte that cannot start a packet is logged and dropped, and
/// parsing resumes with the next byte.
#[derive(Debug)]
pub struct FrameParser {
    buf: Box<[u8]>,
    direction: Direction,
    stats: ParseStats,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Parser for controller-to-host traffic sized for the largest legal packet.
    pub fn new() -> Self {
        Self::with_capacity(MAX_PACKET_SIZE)
    }

    /// Parser with an explicit buffer capacity.
    ///
    /// Capacity below [`MAX_PACKET_SIZE`] is accepted for links known to carry
    /// small packets; a larger packet then fails with
    /// [`FrameError::PayloadOverflow`]. The buffer always fits the longest header.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(PACKET_TYPE_LEN + MAX_HEADER_TAIL_LEN);
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            direction: Direction::default(),
            stats: ParseStats::default(),
        }
    }

    /// Frame traffic flowing in `direction`.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Assemble the next packet.
    ///
    /// Returns `Ok(None)` when the stream ends (or the reader is closed)
    /// between packets. Ending anywhere inside a packet is
    /// [`FrameError::Truncated`]; nothing partial is ever returned.
    pub async fn next_packet<S: StreamSource>(
        &mut self,
        reader: &mut BufferedReader<S>,
    ) -> Result<Option<Packet<'_>>> {
        loop {
            if reader.read_into(&mut self.buf, 0, PACKET_TYPE_LEN).await? == 0 {
                debug!(packets = self.stats.packets, "stream ended between packets");
                return Ok(None);
            }

            let type_byte = self.buf[0];
            let Some((packet_type, tail_len)) = self.direction.frame_rule(type_byte) else {
                self.stats.skipped_bytes += 1;
                warn!(
                    type_byte = format_args!("{type_byte:#04x}"),
                    direction = ?self.direction,
                    "invalid packet type, skipping byte"
                );
                continue;
            };

            let header_end = PACKET_TYPE_LEN + tail_len;
            self.fill(reader, PACKET_TYPE_LEN, tail_len, ReadStage::HeaderTail)
                .await?;

            let payload_len = packet_type.payload_len(&self.buf[PACKET_TYPE_LEN..header_end]);
            let total = header_end + payload_len;
            if total > self.buf.len() {
                return Err(FrameError::PayloadOverflow {
                    packet_len: total,
                    capacity: self.buf.len(),
                });
            }

            if payload_len > 0 {
                self.fill(reader, header_end, payload_len, ReadStage::Payload)
                    .await?;
            }

            self.stats.packets += 1;
            trace!(%packet_type, len = total, "assembled packet");
            return Ok(Some(Packet::new(packet_type, tail_len, &self.buf[..total])));
        }
    }

    /// Assemble packets and hand each to `dispatcher` until the stream ends.
    ///
    /// Packets are dispatched strictly in arrival order; the next packet is
    /// not read until `dispatcher` returns.
    pub async fn run<S, D>(
        &mut self,
        reader: &mut BufferedReader<S>,
        dispatcher: &mut D,
    ) -> Result<ParseStats>
    where
        S: StreamSource,
        D: Dispatcher + ?Sized,
    {
        while let Some(packet) = self.next_packet(reader).await? {
            dispatcher.dispatch(packet)?;
        }
        Ok(self.stats)
    }

    async fn fill<S: StreamSource>(
        &mut self,
        reader: &mut BufferedReader<S>,
        offset: usize,
        length: usize,
        stage: ReadStage,
    ) -> Result<()> {
        let received = reader.read_into(&mut self.buf, offset, length).await?;
        if received < length {
            warn!(%stage, expected = length, received, "stream ended inside packet");
            return Err(FrameError::Truncated {
                stage,
                expected: length,
                received,
            });
        }
        Ok(())
    }
}
