//! Framed message connections for fanlink.
//!
//! Converts a duplex byte stream into a framed message channel with
//! explicit size bounding. One dedicated read loop per connection extracts
//! bounded frames, hands application-message payloads to the message codec
//! collaborator, and surfaces decoded messages to the owner through
//! [`ConnectionObserver`] notifications. A malformed header, an oversized
//! declared length, or a codec failure tears the whole connection down —
//! no partial or corrupted message is ever surfaced.

pub mod codec;
pub mod connection;
pub mod error;
pub mod observer;
pub mod sender;

pub use codec::{JsonCodec, MessageCodec};
pub use connection::{ConnectionHandle, FramedConnection};
pub use error::{CodecError, ConnectionError, Result};
pub use observer::ConnectionObserver;
pub use sender::MessageSender;
