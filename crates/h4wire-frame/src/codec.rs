use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::{FrameError, ReadStage, Result};
use crate::packet::{Direction, OwnedPacket, MAX_PACKET_SIZE, PACKET_TYPE_LEN};

/// `tokio_util` codec for H4 packets.
///
/// Same grammar as [`FrameParser`](crate::FrameParser) for callers that
/// prefer `Framed` streams over explicit reads. Bytes that cannot start a
/// packet are dropped one at a time.
#[derive(Debug, Clone)]
pub struct H4Codec {
    direction: Direction,
    max_packet_size: usize,
    skipped_bytes: u64,
}

impl Default for H4Codec {
    fn default() -> Self {
        Self::new(Direction::default())
    }
}

impl H4Codec {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            max_packet_size: MAX_PACKET_SIZE,
            skipped_bytes: 0,
        }
    }

    /// Reject packets larger than `max_packet_size` bytes.
    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    /// Bytes dropped so far because they could not start a packet.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    fn truncation(&self, src: &BytesMut) -> FrameError {
        let Some((packet_type, tail_len)) = src.first().and_then(|b| self.direction.frame_rule(*b))
        else {
            return FrameError::Truncated {
                stage: ReadStage::HeaderTail,
                expected: 0,
                received: 0,
            };
        };
        let header_end = PACKET_TYPE_LEN + tail_len;
        if src.len() < header_end {
            return FrameError::Truncated {
                stage: ReadStage::HeaderTail,
                expected: tail_len,
                received: src.len() - PACKET_TYPE_LEN,
            };
        }
        FrameError::Truncated {
            stage: ReadStage::Payload,
            expected: packet_type.payload_len(&src[PACKET_TYPE_LEN..header_end]),
            received: src.len() - header_end,
        }
    }
}

impl Decoder for H4Codec {
    type Item = OwnedPacket;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(&type_byte) = src.first() else {
                return Ok(None);
            };
            let Some((packet_type, tail_len)) = self.direction.frame_rule(type_byte) else {
                src.advance(1);
                self.skipped_bytes += 1;
                warn!(
                    type_byte = format_args!("{type_byte:#04x}"),
                    "invalid packet type, skipping byte"
                );
                continue;
            };

            let header_end = PACKET_TYPE_LEN + tail_len;
            if src.len() < header_end {
                src.reserve(header_end - src.len());
                return Ok(None);
            }

            let total = header_end + packet_type.payload_len(&src[PACKET_TYPE_LEN..header_end]);
            if total > self.max_packet_size {
                return Err(FrameError::PayloadOverflow {
                    packet_len: total,
                    capacity: self.max_packet_size,
                });
            }
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            let bytes = src.split_to(total).freeze();
            return Ok(Some(OwnedPacket::from_parts(packet_type, tail_len, bytes)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(self.truncation(src)),
        }
    }
}

impl Encoder<OwnedPacket> for H4Codec {
    type Error = FrameError;

    fn encode(&mut self, item: OwnedPacket, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::packet::PacketType;

    #[test]
    fn decode_waits_for_complete_packet() {
        let mut codec = H4Codec::default();
        let mut buf = BytesMut::from(&[0x04, 0x0e][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x01, 0x05]);
        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet.as_bytes(), &[0x04, 0x0e, 0x01, 0x05]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_skips_invalid_bytes() {
        let mut codec = H4Codec::default();
        let mut buf = BytesMut::from(&[0xff, 0x00, 0x04, 0x0e, 0x00][..]);
        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet.packet_type(), PacketType::Event);
        assert_eq!(codec.skipped_bytes(), 2);
    }

    #[test]
    fn decode_rejects_oversized_packet() {
        let mut codec = H4Codec::default().with_max_packet_size(16);
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x00, 0x20, 0x00][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadOverflow {
                packet_len: 37,
                capacity: 16
            }
        ));
    }

    #[test]
    fn eof_inside_packet_is_truncation() {
        let mut codec = H4Codec::default();
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x00, 0x04, 0x00, 0x01][..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                stage: ReadStage::Payload,
                expected: 4,
                received: 1
            }
        ));

        let mut buf = BytesMut::from(&[0x03, 0x00][..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                stage: ReadStage::HeaderTail,
                expected: 3,
                received: 1
            }
        ));
    }

    #[tokio::test]
    async fn framed_read_over_split_writes() {
        let (mut remote, local) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            remote.write_all(&[0x04, 0x0e]).await.unwrap();
            remote.write_all(&[0x00, 0x02, 0x01, 0x00]).await.unwrap();
            remote.write_all(&[0x01, 0x00, 0x09]).await.unwrap();
        });

        let mut framed = FramedRead::new(local, H4Codec::default());
        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();
        writer.await.unwrap();

        assert_eq!(first.as_bytes(), &[0x04, 0x0e, 0x00]);
        assert_eq!(second.packet_type(), PacketType::Acl);
        assert_eq!(second.payload(), &[0x09]);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_emits_wire_bytes() {
        let mut framed = FramedWrite::new(Vec::new(), H4Codec::new(Direction::HostToController));
        let reset = OwnedPacket::new(PacketType::Command, &[0x03, 0x0c, 0x00]).unwrap();
        framed.send(reset).await.unwrap();
        assert_eq!(framed.get_ref().as_slice(), &[0x01, 0x03, 0x0c, 0x00]);
    }
}
