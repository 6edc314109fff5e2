//! Bluetooth HCI H4 framing for serial links.
//!
//! h4wire turns the raw byte stream of an HCI UART link, delivered in
//! whatever chunks the transport produces, into complete HCI packets.
//!
//! # Crate Structure
//!
//! - [`transport`] - Chunked byte sources (tokio streams, host-fed channels, Unix sockets)
//! - [`frame`] - Exact-length buffered reads and the H4 framing state machine
//! - [`session`] - Per-link ownership and lifecycle (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use h4wire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use h4wire_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use h4wire_session::*;
}
