//! Length-prefixed codec for TCP framing
//!
//! All messages are framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: JSON Envelope ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::Envelope;

/// Hard ceiling on a frame body (10 MB)
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

const PREFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, u32),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an Envelope into a length-prefixed byte buffer
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_into(envelope, &mut buf, MAX_MESSAGE_SIZE)?;
    Ok(buf.freeze())
}

/// Encode an Envelope into `buf`, refusing bodies larger than `max_len`
pub fn encode_into(envelope: &Envelope, buf: &mut BytesMut, max_len: u32) -> Result<(), CodecError> {
    let body = serde_json::to_vec(envelope)?;
    let max_len = max_len.min(MAX_MESSAGE_SIZE);

    if body.len() > max_len as usize {
        return Err(CodecError::MessageTooLarge(body.len(), max_len));
    }

    buf.reserve(PREFIX_LEN + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_slice(&body);

    Ok(())
}

/// Try to decode a length-prefixed Envelope from a buffer
///
/// Returns:
/// - `Ok(Some(envelope))` if a complete message was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the data is invalid
pub fn decode(buf: &mut BytesMut, max_len: u32) -> Result<Option<Envelope>, CodecError> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }

    // Peek at the length prefix without consuming
    let msg_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

    if msg_len > max_len.min(MAX_MESSAGE_SIZE) {
        return Err(CodecError::InvalidLength(msg_len));
    }

    let total_len = PREFIX_LEN + msg_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(PREFIX_LEN);
    let body = buf.split_to(msg_len as usize);

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Streaming decoder that accumulates partial frames
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_len: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_len(MAX_MESSAGE_SIZE)
    }

    /// Decoder that rejects frames longer than `max_len` (capped at [`MAX_MESSAGE_SIZE`])
    pub fn with_max_len(max_len: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_len: max_len.min(MAX_MESSAGE_SIZE),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Envelope>, CodecError> {
        decode(&mut self.buffer, self.max_len)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Payload, Request};

    fn create_test_envelope() -> Envelope {
        Envelope::request("console-test", 1, Request::GetMatrix { id: 3 })
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = create_test_envelope();
        let encoded = encode(&original).expect("encode failed");

        let len_prefix = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len_prefix as usize, encoded.len() - 4);

        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = decode(&mut buf, MAX_MESSAGE_SIZE)
            .expect("decode failed")
            .expect("no message");

        assert_eq!(decoded, original);
        assert!(buf.is_empty(), "buffer should be empty after decode");
    }

    #[test]
    fn test_partial_decode() {
        let encoded = encode(&create_test_envelope()).expect("encode failed");

        let mut buf = BytesMut::from(&encoded[..5]);
        let result = decode(&mut buf, MAX_MESSAGE_SIZE).expect("partial data is not an error");
        assert!(result.is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_frame_decoder_in_chunks() {
        let envelope = create_test_envelope();
        let encoded = encode(&envelope).expect("encode failed");

        let mut decoder = FrameDecoder::new();
        decoder.extend(&encoded[..5]);
        assert!(decoder.decode_next().expect("decode error").is_none());

        decoder.extend(&encoded[5..]);
        let decoded = decoder
            .decode_next()
            .expect("decode error")
            .expect("should have message");

        assert!(matches!(
            decoded.payload,
            Payload::Request(Request::GetMatrix { id: 3 })
        ));
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_multiple_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&encode(&create_test_envelope()).unwrap());
        decoder.extend(&encode(&create_test_envelope()).unwrap());

        assert!(decoder.decode_next().expect("decode error").is_some());
        assert!(decoder.decode_next().expect("decode error").is_some());
        assert!(decoder.decode_next().expect("decode error").is_none());
    }

    #[test]
    fn test_length_prefix_over_limit() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_MESSAGE_SIZE + 1);
        buf.put_bytes(0, 100);

        let result = decode(&mut buf, MAX_MESSAGE_SIZE);
        assert!(matches!(result, Err(CodecError::InvalidLength(_))));
    }

    #[test]
    fn test_configured_limit_applies() {
        let encoded = encode(&create_test_envelope()).unwrap();

        let mut decoder = FrameDecoder::with_max_len(8);
        decoder.extend(&encoded);
        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::InvalidLength(_))
        ));

        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_into(&create_test_envelope(), &mut buf, 8),
            Err(CodecError::MessageTooLarge(_, 8))
        ));
    }

    #[test]
    fn test_garbage_body_is_json_error() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_slice(b"{{{");

        assert!(matches!(
            decode(&mut buf, MAX_MESSAGE_SIZE),
            Err(CodecError::Json(_))
        ));
    }
}
