//! Fixed-header message framing for fanlink.
//!
//! Every protocol message travels in a frame with a 4-byte header:
//! - A 1-byte frame-type tag (application message, ping, pong)
//! - A 3-byte network-byte-order payload length (24-bit range)
//!
//! The declared length is validated against the connection's negotiated
//! maximum from the header alone, so an oversized or malformed frame is
//! rejected before any payload bytes are waited on. No partial frame is
//! ever surfaced to callers.

pub mod codec;
pub mod error;
pub mod header;

pub use codec::{decode_frame, encode_frame, Frame};
pub use error::{FrameError, Result};
pub use header::{
    parse_header, write_header, FrameType, DEFAULT_MAX_MESSAGE_SIZE, HEADER_SIZE, MAX_FRAME_LENGTH,
};
