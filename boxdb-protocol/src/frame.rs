//! Length-prefixed framing.
//!
//! Frame layout (5-byte prefix + payload):
//!
//! ```text
//! +------+----------------+----------------------------+
//! | 0xce | length (u32 BE)| payload: header map + body |
//! +------+----------------+----------------------------+
//! ```
//!
//! The prefix tag is the "unsigned 32-bit integer follows" marker; the
//! length counts exactly the payload bytes after the prefix.

use crate::codec::{self, Decoder, FIXMAP_MASK, FIX_COLLECTION_MAX, TAG_UINT32};
use crate::error::ProtocolError;
use crate::request::{Header, Request};
use crate::value::Value;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{BufMut, BytesMut};

/// Size of the length prefix: one tag byte plus a big-endian u32.
pub const FRAME_PREFIX_SIZE: usize = 5;

/// Encodes a request into a complete frame.
pub fn encode_request(request: &impl Request) -> Result<BytesMut, ProtocolError> {
    encode(&request.header(), &request.body())
}

/// Encodes a (header, body) pair into a complete frame.
///
/// Also usable for building response frames, which share the layout.
pub fn encode(header: &Header, body: &Value) -> Result<BytesMut, ProtocolError> {
    let mut payload = BytesMut::with_capacity(64);
    encode_header(&mut payload, header)?;
    codec::encode_value(&mut payload, body)?;

    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len() as u32,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut frame = BytesMut::with_capacity(FRAME_PREFIX_SIZE + payload.len());
    frame.put_u8(TAG_UINT32);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

fn encode_header(buf: &mut BytesMut, header: &Header) -> Result<(), ProtocolError> {
    if header.len() > FIX_COLLECTION_MAX {
        return Err(ProtocolError::MapTooLarge {
            len: header.len(),
            max: FIX_COLLECTION_MAX,
        });
    }
    buf.put_u8(FIXMAP_MASK | header.len() as u8);
    for (&k, &v) in header {
        codec::encode_uint(buf, k as u64);
        codec::encode_uint(buf, v);
    }
    Ok(())
}

/// Validates the length prefix of a received frame and returns the
/// payload slice.
///
/// The declared length must equal the bytes actually present after the
/// prefix; a mismatch is a framing error, never treated as a short read.
pub fn split_payload(frame: &[u8]) -> Result<&[u8], ProtocolError> {
    if frame.len() < FRAME_PREFIX_SIZE {
        return Err(ProtocolError::Truncated {
            needed: FRAME_PREFIX_SIZE - frame.len(),
            context: "length prefix",
        });
    }
    if frame[0] != TAG_UINT32 {
        return Err(ProtocolError::InvalidLengthTag(frame[0]));
    }
    let declared = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
    let actual = frame.len() - FRAME_PREFIX_SIZE;
    if declared != actual {
        return Err(ProtocolError::LengthMismatch { declared, actual });
    }
    Ok(&frame[FRAME_PREFIX_SIZE..])
}

/// Decodes a received frame's header map, enforcing single-byte keys
/// and integer values.
pub fn decode_header(decoder: &mut Decoder<'_>) -> Result<Header, ProtocolError> {
    let value = decoder.decode_value()?;
    let entries = match &value {
        Value::Map(entries) => entries,
        _ => return Err(ProtocolError::InvalidHeader),
    };
    let mut header = Header::new();
    for (k, v) in entries {
        header.insert(k.as_key_byte()?, v.as_uint()?);
    }
    Ok(header)
}
