/// Errors that can occur during frame header encoding/decoding.
///
/// Every variant is a protocol violation to the connection that observes
/// it: the connection is torn down, never retried per-frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a tag this implementation does not recognize.
    #[error("unknown frame type tag 0x{tag:02x}")]
    UnknownFrameType { tag: u8 },

    /// The declared payload length exceeds the negotiated maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload length cannot be represented in the header's 24 bits.
    #[error("frame length {length} exceeds 24-bit header range")]
    LengthOverflow { length: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
