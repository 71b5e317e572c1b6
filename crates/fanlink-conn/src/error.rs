/// Raised by a message codec when a payload cannot be decoded or a message
/// cannot be formatted. Decode failures are connection-fatal.
#[derive(Debug, thiserror::Error)]
#[error("codec failure: {reason}")]
pub struct CodecError {
    reason: String,
}

impl CodecError {
    /// Create a codec error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur on a framed connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Protocol violation in an incoming frame header.
    #[error("protocol violation: {0}")]
    Frame(#[from] fanlink_frame::FrameError),

    /// The message codec rejected a payload or a message.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// I/O failure on the underlying stream.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure in the underlying transport.
    #[error("transport error: {0}")]
    Transport(#[from] fanlink_transport::TransportError),

    /// An outgoing message exceeds the negotiated maximum size.
    #[error("outgoing message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The connection is no longer open.
    #[error("connection is not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
