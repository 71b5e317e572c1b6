use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::BytesMut;
use fanlink_frame::{write_header, FrameType, HEADER_SIZE};
use fanlink_transport::SessionStream;

use crate::codec::MessageCodec;
use crate::connection::LinkShared;
use crate::error::{ConnectionError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// The send half of a framed connection.
///
/// Messages are encoded in two phases: a header-sized prefix is reserved
/// in the output buffer, the codec formats the payload after it, the
/// payload is measured, and the header is patched in place with the
/// observed length before anything hits the wire.
///
/// Calls are not internally serialized; concurrent callers must serialize
/// themselves (`&mut self` makes the compiler enforce it within one
/// process).
pub struct MessageSender<C: MessageCodec> {
    stream: SessionStream,
    codec: Arc<C>,
    buf: BytesMut,
    shared: Arc<LinkShared>,
    max_message_size: usize,
}

impl<C: MessageCodec> MessageSender<C> {
    pub(crate) fn new(
        stream: SessionStream,
        codec: Arc<C>,
        shared: Arc<LinkShared>,
        max_message_size: usize,
    ) -> Self {
        Self {
            stream,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            shared,
            max_message_size,
        }
    }

    /// Encode and send one application message.
    ///
    /// Nothing is written to the stream if encoding fails or the formatted
    /// payload exceeds the negotiated maximum.
    pub fn send(&mut self, message: &C::Message) -> Result<()> {
        if !self.shared.is_connected() {
            return Err(ConnectionError::NotConnected);
        }

        // Phase one: reserve the header prefix and format after it.
        self.buf.clear();
        self.buf.resize(HEADER_SIZE, 0);
        self.codec.encode(message, &mut self.buf)?;

        // Phase two: measure and backfill the header in place.
        let payload_len = self.buf.len() - HEADER_SIZE;
        if payload_len > self.max_message_size {
            return Err(ConnectionError::MessageTooLarge {
                size: payload_len,
                max: self.max_message_size,
            });
        }
        write_header(FrameType::Message, payload_len, &mut self.buf[..HEADER_SIZE])?;

        self.write_buffer()?;
        self.flush()
    }

    /// Reflects the shared connection state.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    fn write_buffer(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.stream.write(&self.buf[offset..]) {
                Ok(0) => return Err(ConnectionError::NotConnected),
                Ok(written) => offset += written,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ConnectionError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ConnectionError::Io(err)),
            }
        }
    }
}
