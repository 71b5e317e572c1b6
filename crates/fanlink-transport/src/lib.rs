//! Duplex byte-stream primitive for fanlink.
//!
//! Provides [`SessionStream`], the ordered byte stream a framed connection
//! exclusively owns for its lifetime. Beyond plain reads and writes it
//! supports waking a blocked read ([`SessionStream::cancel_pending_read`])
//! and marking each direction finished, which is what connection disposal
//! is built on.
//!
//! This is the lowest layer of fanlink. Everything else builds on top of
//! the [`SessionStream`] type provided here.

pub mod error;
pub mod stream;

pub use error::{Result, TransportError};
pub use stream::SessionStream;
