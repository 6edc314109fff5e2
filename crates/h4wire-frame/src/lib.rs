//! HCI H4 packet framing over chunked byte streams.
//!
//! An H4 link carries Bluetooth HCI packets back to back with no delimiter.
//! Every packet starts with a one-byte type indicator, followed by a
//! type-specific header tail that announces the payload length:
//! - EVENT: 2-byte tail, length in its second byte
//! - SCO (and COMMAND, host to controller): 3-byte tail, length in its third byte
//! - ACL and ISO: 4-byte tail, little-endian 16-bit length in its last two bytes
//!
//! [`BufferedReader`] turns arbitrarily split chunks into exact-length reads;
//! [`FrameParser`] uses it to assemble one packet at a time and hand it to a
//! [`Dispatcher`].

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod packet;
pub mod parser;
pub mod reader;
pub mod writer;

pub use codec::H4Codec;
pub use dispatch::{dispatch_fn, ChannelDispatcher, Dispatcher, FnDispatcher, PacketCollector};
pub use error::{FrameError, ReadStage, Result};
pub use packet::{
    encode_packet, Direction, OwnedPacket, Packet, PacketType, MAX_HEADER_TAIL_LEN,
    MAX_PACKET_SIZE, MAX_PAYLOAD_LEN, PACKET_TYPE_LEN,
};
pub use parser::{FrameParser, ParseStats};
pub use reader::{BufferedReader, CloseHandle};
pub use writer::PacketWriter;
