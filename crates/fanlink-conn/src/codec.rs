use bytes::BytesMut;

use crate::error::CodecError;

/// The message encoding/decoding collaborator of a framed connection.
///
/// The connection core treats payloads as opaque; a codec gives them
/// meaning. Text and binary codecs both fit this trait — `encode` appends
/// to the provided buffer so the connection can reserve a header prefix
/// before the payload and backfill it afterwards.
pub trait MessageCodec: Send + Sync {
    /// The decoded message type surfaced to the owner.
    type Message;

    /// Decode one complete frame payload.
    fn decode(&self, payload: &[u8]) -> std::result::Result<Self::Message, CodecError>;

    /// Format a message, appending to `dst`. Returns the byte count written.
    fn encode(
        &self,
        message: &Self::Message,
        dst: &mut BytesMut,
    ) -> std::result::Result<usize, CodecError>;
}

/// Reference codec: messages are JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    type Message = serde_json::Value;

    fn decode(&self, payload: &[u8]) -> std::result::Result<Self::Message, CodecError> {
        serde_json::from_slice(payload).map_err(|err| CodecError::new(err.to_string()))
    }

    fn encode(
        &self,
        message: &Self::Message,
        dst: &mut BytesMut,
    ) -> std::result::Result<usize, CodecError> {
        let bytes =
            serde_json::to_vec(message).map_err(|err| CodecError::new(err.to_string()))?;
        dst.extend_from_slice(&bytes);
        Ok(bytes.len())
    }
}
