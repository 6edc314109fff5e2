use std::fmt;

use h4wire_transport::TransportError;

use crate::packet::PacketType;

/// Where in a packet a read came up short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    /// The bytes after the packet-type byte that carry the payload length.
    HeaderTail,
    /// The payload itself.
    Payload,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStage::HeaderTail => f.write_str("header"),
            ReadStage::Payload => f.write_str("payload"),
        }
    }
}

/// Errors that can occur while framing or writing H4 packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A read was requested past the end of the destination buffer.
    #[error("read of {length} bytes at offset {offset} exceeds buffer capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },

    /// The type byte has no framing rule.
    #[error("invalid packet type {0:#04x}")]
    InvalidPacketType(u8),

    /// The announced packet does not fit the destination buffer.
    #[error("packet of {packet_len} bytes exceeds buffer capacity {capacity}")]
    PayloadOverflow { packet_len: usize, capacity: usize },

    /// The stream ended partway through a packet.
    #[error("stream ended mid-{stage}: expected {expected} bytes, received {received}")]
    Truncated {
        stage: ReadStage,
        expected: usize,
        received: usize,
    },

    /// An outgoing packet body disagrees with its own length field.
    #[error("{packet_type} packet body is {actual} bytes, header announces {expected}")]
    LengthMismatch {
        packet_type: PacketType,
        expected: usize,
        actual: usize,
    },

    /// The dispatcher refused a packet.
    #[error("dispatch failed: {0}")]
    Dispatch(Box<dyn std::error::Error + Send + Sync>),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error surfaced through a codec.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Wrap an arbitrary dispatcher error.
    pub fn dispatch(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        FrameError::Dispatch(err.into())
    }

    /// Whether this error leaves the stream position unknown.
    ///
    /// Every variant except a refused dispatch does; after one of those the
    /// reader must be discarded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FrameError::Dispatch(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
