//! Session ownership of an H4 link.
//!
//! A [`Session`] owns everything one link needs: the connector that opens
//! it, the current reader, the packet buffer and the dispatcher. Nothing is
//! process-global, so any number of sessions can run side by side and each
//! tears down on its own.

pub mod error;
pub mod session;

pub use error::{Result, SessionError};
pub use session::{EndReason, Session, SessionConfig, SessionSummary};
