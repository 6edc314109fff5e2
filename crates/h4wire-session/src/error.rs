/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (opening or closing the link).
    #[error("transport error: {0}")]
    Transport(#[from] h4wire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] h4wire_frame::FrameError),

    /// The session has no open link.
    #[error("session {0} has no open link")]
    NotOpen(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
