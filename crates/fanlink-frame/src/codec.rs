use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::header::{parse_header, write_header, FrameType, HEADER_SIZE};

/// One transport-level unit: a typed, length-bounded payload.
///
/// Ephemeral — scoped to a single read-loop iteration. The payload is a
/// zero-copy slice of the connection's read buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The frame-type tag from the header.
    pub frame_type: FrameType,
    /// The frame payload, opaque at this layer.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────────┬──────────────────┐
/// │ Type (1B)  │ Length        │ Payload          │
/// │ 0=message  │ (3B, network  │ (Length bytes)   │
/// │ 1=ping     │  byte order)  │                  │
/// │ 2=pong     │               │                  │
/// └────────────┴───────────────┴──────────────────┘
/// ```
pub fn encode_frame(frame_type: FrameType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let mut header = [0u8; HEADER_SIZE];
    write_header(frame_type, payload.len(), &mut header)?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
///
/// The declared length is checked against `max_message_size` as soon as
/// the header is available — an oversized declaration fails without
/// waiting for (or allocating for) the payload.
pub fn decode_frame(src: &mut BytesMut, max_message_size: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header: [u8; HEADER_SIZE] = src[..HEADER_SIZE].try_into().unwrap();
    let (frame_type, payload_len) = parse_header(header)?;

    if payload_len > max_message_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_message_size,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        frame_type,
        payload,
    }))
}
