use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Length of the packet-type indicator that starts every H4 packet.
pub const PACKET_TYPE_LEN: usize = 1;

/// Longest header tail of any framable packet type (ACL and ISO).
pub const MAX_HEADER_TAIL_LEN: usize = 4;

/// Largest payload a 16-bit length field can announce.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Smallest buffer able to hold the largest legal packet.
pub const MAX_PACKET_SIZE: usize = PACKET_TYPE_LEN + MAX_HEADER_TAIL_LEN + MAX_PAYLOAD_LEN;

/// H4 packet-type indicator.
///
/// Wire values are fixed by the HCI UART transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Command = 0x01,
    Acl = 0x02,
    Sco = 0x03,
    Event = 0x04,
    Iso = 0x05,
    Reserved = 0x06,
}

impl PacketType {
    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketType::Command => "COMMAND",
            PacketType::Acl => "ACL",
            PacketType::Sco => "SCO",
            PacketType::Event => "EVENT",
            PacketType::Iso => "ISO",
            PacketType::Reserved => "RESERVED",
        }
    }

    /// Number of header bytes following the type byte, or `None` when the
    /// type has no framing rule.
    pub fn header_tail_len(self) -> Option<usize> {
        match self {
            PacketType::Event => Some(2),
            PacketType::Command | PacketType::Sco => Some(3),
            PacketType::Acl | PacketType::Iso => Some(4),
            PacketType::Reserved => None,
        }
    }

    /// Payload length announced by a complete header tail.
    ///
    /// `tail` must hold exactly [`header_tail_len`](Self::header_tail_len)
    /// bytes; shorter tails announce nothing.
    pub fn payload_len(self, tail: &[u8]) -> usize {
        match (self, tail) {
            (PacketType::Event, [_, len]) => usize::from(*len),
            (PacketType::Command | PacketType::Sco, [_, _, len]) => usize::from(*len),
            (PacketType::Acl | PacketType::Iso, [_, _, lo, hi]) => {
                usize::from(u16::from_le_bytes([*lo, *hi]))
            }
            _ => 0,
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(PacketType::Command),
            0x02 => Ok(PacketType::Acl),
            0x03 => Ok(PacketType::Sco),
            0x04 => Ok(PacketType::Event),
            0x05 => Ok(PacketType::Iso),
            0x06 => Ok(PacketType::Reserved),
            other => Err(FrameError::InvalidPacketType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the link a byte stream comes from.
///
/// A host only ever receives ACL, SCO, event and ISO packets; a controller
/// receives commands instead of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    ControllerToHost,
    HostToController,
}

impl Direction {
    /// Framing rule for a type byte: the packet type and its header tail
    /// length, or `None` when the byte cannot start a packet in this direction.
    pub fn frame_rule(self, type_byte: u8) -> Option<(PacketType, usize)> {
        let packet_type = PacketType::try_from(type_byte).ok()?;
        let accepted = match (self, packet_type) {
            (_, PacketType::Acl | PacketType::Sco | PacketType::Iso) => true,
            (Direction::ControllerToHost, PacketType::Event) => true,
            (Direction::HostToController, PacketType::Command) => true,
            _ => false,
        };
        if !accepted {
            return None;
        }
        packet_type.header_tail_len().map(|tail| (packet_type, tail))
    }
}

/// A complete packet resident in a parser's buffer.
///
/// The borrow ties the packet to the buffer: it cannot be held across the
/// next read. Use [`to_owned_packet`](Packet::to_owned_packet) to keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    packet_type: PacketType,
    header_tail_len: usize,
    bytes: &'a [u8],
}

impl<'a> Packet<'a> {
    pub(crate) fn new(packet_type: PacketType, header_tail_len: usize, bytes: &'a [u8]) -> Self {
        Self {
            packet_type,
            header_tail_len,
            bytes,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Header tail (the bytes between the type byte and the payload).
    pub fn header(&self) -> &'a [u8] {
        &self.bytes[PACKET_TYPE_LEN..PACKET_TYPE_LEN + self.header_tail_len]
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[PACKET_TYPE_LEN + self.header_tail_len..]
    }

    /// The whole packet including the type byte.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Total wire length (type byte, header tail and payload).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the packet out of the parser's buffer.
    pub fn to_owned_packet(&self) -> OwnedPacket {
        OwnedPacket {
            packet_type: self.packet_type,
            header_tail_len: self.header_tail_len,
            bytes: Bytes::copy_from_slice(self.bytes),
        }
    }
}

/// A packet that owns its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPacket {
    packet_type: PacketType,
    header_tail_len: usize,
    bytes: Bytes,
}

impl OwnedPacket {
    /// Build a packet from its type and body (header tail followed by payload).
    ///
    /// Fails when the body does not match the length its own header announces.
    pub fn new(packet_type: PacketType, body: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(PACKET_TYPE_LEN + body.len());
        encode_packet(packet_type, body, &mut buf)?;
        Ok(Self {
            packet_type,
            header_tail_len: packet_type.header_tail_len().unwrap_or(0),
            bytes: buf.freeze(),
        })
    }

    pub(crate) fn from_parts(packet_type: PacketType, header_tail_len: usize, bytes: Bytes) -> Self {
        Self {
            packet_type,
            header_tail_len,
            bytes,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Borrowed view of this packet.
    pub fn as_packet(&self) -> Packet<'_> {
        Packet::new(self.packet_type, self.header_tail_len, &self.bytes)
    }

    pub fn header(&self) -> &[u8] {
        self.as_packet().header()
    }

    pub fn payload(&self) -> &[u8] {
        self.as_packet().payload()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Frame a packet into `dst`.
///
/// `body` is the header tail followed by the payload. The payload length
/// must equal the one the header tail announces.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────────┬──────────────────┐
/// │ Type (1B)│ Header tail          │ Payload          │
/// │          │ EVENT 2B, SCO/CMD 3B │ (announced len)  │
/// │          │ ACL/ISO 4B           │                  │
/// └──────────┴──────────────────────┴──────────────────┘
/// ```
pub fn encode_packet(packet_type: PacketType, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let tail_len = packet_type
        .header_tail_len()
        .ok_or(FrameError::InvalidPacketType(packet_type.as_u8()))?;
    if body.len() < tail_len {
        return Err(FrameError::LengthMismatch {
            packet_type,
            expected: tail_len,
            actual: body.len(),
        });
    }

    let (tail, payload) = body.split_at(tail_len);
    let announced = packet_type.payload_len(tail);
    if payload.len() != announced {
        return Err(FrameError::LengthMismatch {
            packet_type,
            expected: tail_len + announced,
            actual: body.len(),
        });
    }

    dst.reserve(PACKET_TYPE_LEN + body.len());
    dst.put_u8(packet_type.as_u8());
    dst.put_slice(body);
    Ok(())
}
