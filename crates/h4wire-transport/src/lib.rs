//! Chunked byte sources for HCI UART links.
//!
//! A link delivers bytes in whatever pieces the driver hands up. This crate
//! hides the origin of those pieces behind [`StreamSource`]:
//! - [`IoSource`] wraps any tokio reader/writer (serial device files, sockets)
//! - [`ChunkChannel`] is fed by a host runtime pushing chunks explicitly
//! - [`UnixDomainSocket`] bridges a serial link exposed as a Unix socket
//!
//! Opening and re-opening a link goes through a [`Connector`].

pub mod channel;
pub mod error;
pub mod io;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use channel::{ChunkChannel, ChunkSender};
pub use error::{Result, TransportError};
pub use io::{IoSource, DEFAULT_CHUNK_SIZE};
pub use traits::{Connector, FlowControl, LinkSettings, OnceConnector, StreamSource};

#[cfg(unix)]
pub use uds::{UnixConnector, UnixDomainSocket};
