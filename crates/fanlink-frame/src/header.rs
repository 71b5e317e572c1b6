use crate::error::{FrameError, Result};

/// Frame header: type tag (1) + payload length (3, network byte order) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload length representable in the header's 24 length bits.
pub const MAX_FRAME_LENGTH: usize = 0x00FF_FFFF;

/// Default maximum message size when the setup negotiated no tighter bound.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = MAX_FRAME_LENGTH;

/// Frame type tag carried in the most significant header byte.
///
/// Only [`Message`](FrameType::Message) frames carry application payloads.
/// `Ping` and `Pong` are accepted at the header level and ignored by the
/// connection core; keepalive policy is an extension point for the owner.
/// Any other tag value is a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Application message, decoded by the message codec.
    Message = 0,
    /// Keepalive request.
    Ping = 1,
    /// Keepalive response.
    Pong = 2,
}

impl FrameType {
    /// Parse a tag byte. Tags 3..=255 are reserved and rejected.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FrameType::Message),
            1 => Ok(FrameType::Ping),
            2 => Ok(FrameType::Pong),
            tag => Err(FrameError::UnknownFrameType { tag }),
        }
    }

    /// The wire tag for this frame type.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Write a frame header into `dst[..HEADER_SIZE]`.
///
/// Writes exactly [`HEADER_SIZE`] bytes. Also used to backfill a reserved
/// header prefix after the payload has been formatted and measured.
///
/// # Panics
///
/// Panics if `dst` is shorter than [`HEADER_SIZE`]; callers reserve the
/// prefix before formatting.
pub fn write_header(frame_type: FrameType, length: usize, dst: &mut [u8]) -> Result<()> {
    if length > MAX_FRAME_LENGTH {
        return Err(FrameError::LengthOverflow { length });
    }
    dst[0] = frame_type.tag();
    dst[1] = (length >> 16) as u8;
    dst[2] = (length >> 8) as u8;
    dst[3] = length as u8;
    Ok(())
}

/// Parse a frame header: `(frame type, declared payload length)`.
///
/// Failure here is treated identically to any other protocol violation by
/// the connection that called it.
pub fn parse_header(header: [u8; HEADER_SIZE]) -> Result<(FrameType, usize)> {
    let frame_type = FrameType::from_tag(header[0])?;
    let length =
        ((header[1] as usize) << 16) | ((header[2] as usize) << 8) | (header[3] as usize);
    Ok((frame_type, length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_all_types() {
        for frame_type in [FrameType::Message, FrameType::Ping, FrameType::Pong] {
            for length in [0usize, 1, 255, 256, 65_535, 65_536, MAX_FRAME_LENGTH] {
                let mut header = [0u8; HEADER_SIZE];
                write_header(frame_type, length, &mut header).unwrap();

                let (parsed_type, parsed_length) = parse_header(header).unwrap();
                assert_eq!(parsed_type, frame_type);
                assert_eq!(parsed_length, length);
            }
        }
    }

    #[test]
    fn length_is_network_byte_order() {
        let mut header = [0u8; HEADER_SIZE];
        write_header(FrameType::Message, 0x0102_03, &mut header).unwrap();
        assert_eq!(header, [0x00, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn length_overflow_rejected() {
        let mut header = [0u8; HEADER_SIZE];
        let err = write_header(FrameType::Message, MAX_FRAME_LENGTH + 1, &mut header).unwrap_err();
        assert!(matches!(err, FrameError::LengthOverflow { .. }));
    }

    #[test]
    fn unknown_tag_rejected() {
        for tag in [3u8, 7, 0x7F, 0xFF] {
            let err = parse_header([tag, 0, 0, 1]).unwrap_err();
            assert!(matches!(err, FrameError::UnknownFrameType { tag: t } if t == tag));
        }
    }

    #[test]
    fn tag_accessor_matches_wire_value() {
        assert_eq!(FrameType::Message.tag(), 0);
        assert_eq!(FrameType::Ping.tag(), 1);
        assert_eq!(FrameType::Pong.tag(), 2);
    }
}
