use bytes::BytesMut;
use h4wire_transport::StreamSource;
use tracing::trace;

use crate::error::Result;
use crate::packet::{encode_packet, OwnedPacket, PacketType};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes framed packets to a link.
///
/// The writer keeps no source of its own: the same source is shared with the
/// reading side, so callers pass it in between reads.
#[derive(Debug)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Frame `body` (header tail and payload) as `packet_type` and write it.
    pub async fn send<S: StreamSource>(
        &mut self,
        source: &mut S,
        packet_type: PacketType,
        body: &[u8],
    ) -> Result<()> {
        self.buf.clear();
        encode_packet(packet_type, body, &mut self.buf)?;
        trace!(%packet_type, len = self.buf.len(), "writing packet");
        source.write(&self.buf).await?;
        Ok(())
    }

    /// Write an already framed packet.
    pub async fn write_packet<S: StreamSource>(
        &mut self,
        source: &mut S,
        packet: &OwnedPacket,
    ) -> Result<()> {
        trace!(packet_type = %packet.packet_type(), len = packet.len(), "writing packet");
        source.write(packet.as_bytes()).await?;
        Ok(())
    }
}
