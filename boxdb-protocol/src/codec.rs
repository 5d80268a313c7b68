//! Minimal MessagePack-subset codec.
//!
//! The encode side emits only the fixed forms the protocol needs:
//! fixmap/fixarray (up to 15 entries), fixstr (up to 31 bytes), bin 8,
//! nil, and explicit 8/16/32/64-bit integer tags. Anything larger is a
//! hard encoding error, not a silent widening.
//!
//! The decode side additionally accepts positive fixint, str 8, and
//! map 16/32, which servers use freely in response headers and error
//! bodies. Every other tag is rejected as unsupported.

use crate::error::ProtocolError;
use crate::value::Value;
use bytes::{BufMut, BytesMut};

pub const TAG_NIL: u8 = 0xc0;
pub const TAG_BIN8: u8 = 0xc4;
pub const TAG_UINT8: u8 = 0xcc;
pub const TAG_UINT16: u8 = 0xcd;
pub const TAG_UINT32: u8 = 0xce;
pub const TAG_UINT64: u8 = 0xcf;
pub const TAG_INT8: u8 = 0xd0;
pub const TAG_INT16: u8 = 0xd1;
pub const TAG_INT32: u8 = 0xd2;
pub const TAG_INT64: u8 = 0xd3;
pub const TAG_STR8: u8 = 0xd9;
pub const TAG_MAP16: u8 = 0xde;
pub const TAG_MAP32: u8 = 0xdf;

pub const FIXMAP_MASK: u8 = 0x80;
pub const FIXARRAY_MASK: u8 = 0x90;
pub const FIXSTR_MASK: u8 = 0xa0;

/// Maximum entry count for fixmap/fixarray.
pub const FIX_COLLECTION_MAX: usize = 15;

/// Maximum byte length for fixstr.
pub const FIXSTR_MAX: usize = 31;

/// Encodes a value into `buf` using the fixed forms only.
pub fn encode_value(buf: &mut BytesMut, value: &Value) -> Result<(), ProtocolError> {
    match value {
        Value::Nil => buf.put_u8(TAG_NIL),
        Value::UInt(v) => encode_uint(buf, *v),
        Value::Int(v) => encode_int(buf, *v),
        Value::Str(s) => encode_str(buf, s)?,
        Value::Bin(b) => encode_bin(buf, b)?,
        Value::Array(items) => {
            if items.len() > FIX_COLLECTION_MAX {
                return Err(ProtocolError::ArrayTooLarge {
                    len: items.len(),
                    max: FIX_COLLECTION_MAX,
                });
            }
            buf.put_u8(FIXARRAY_MASK | items.len() as u8);
            for item in items {
                encode_value(buf, item)?;
            }
        }
        Value::Map(entries) => {
            if entries.len() > FIX_COLLECTION_MAX {
                return Err(ProtocolError::MapTooLarge {
                    len: entries.len(),
                    max: FIX_COLLECTION_MAX,
                });
            }
            buf.put_u8(FIXMAP_MASK | entries.len() as u8);
            for (k, v) in entries {
                encode_value(buf, k)?;
                encode_value(buf, v)?;
            }
        }
    }
    Ok(())
}

/// Encodes an unsigned integer with the narrowest explicit tag.
pub fn encode_uint(buf: &mut BytesMut, v: u64) {
    if v <= u8::MAX as u64 {
        buf.put_u8(TAG_UINT8);
        buf.put_u8(v as u8);
    } else if v <= u16::MAX as u64 {
        buf.put_u8(TAG_UINT16);
        buf.put_u16(v as u16);
    } else if v <= u32::MAX as u64 {
        buf.put_u8(TAG_UINT32);
        buf.put_u32(v as u32);
    } else {
        buf.put_u8(TAG_UINT64);
        buf.put_u64(v);
    }
}

fn encode_int(buf: &mut BytesMut, v: i64) {
    if v >= 0 {
        encode_uint(buf, v as u64);
    } else if v >= i8::MIN as i64 {
        buf.put_u8(TAG_INT8);
        buf.put_i8(v as i8);
    } else if v >= i16::MIN as i64 {
        buf.put_u8(TAG_INT16);
        buf.put_i16(v as i16);
    } else if v >= i32::MIN as i64 {
        buf.put_u8(TAG_INT32);
        buf.put_i32(v as i32);
    } else {
        buf.put_u8(TAG_INT64);
        buf.put_i64(v);
    }
}

/// Encodes a short string. Strings over 31 bytes do not fit the fixstr
/// form and are a hard error.
pub fn encode_str(buf: &mut BytesMut, s: &str) -> Result<(), ProtocolError> {
    let len = s.len();
    if len > FIXSTR_MAX {
        return Err(ProtocolError::StringTooLong {
            len,
            max: FIXSTR_MAX,
        });
    }
    buf.put_u8(FIXSTR_MASK | len as u8);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn encode_bin(buf: &mut BytesMut, b: &[u8]) -> Result<(), ProtocolError> {
    let len = b.len();
    if len > u8::MAX as usize {
        return Err(ProtocolError::BinaryTooLong {
            len,
            max: u8::MAX as usize,
        });
    }
    buf.put_u8(TAG_BIN8);
    buf.put_u8(len as u8);
    buf.put_slice(b);
    Ok(())
}

/// A cursor decoder over a complete payload.
///
/// Tracks how many bytes it consumed so the frame layer can reject
/// trailing garbage.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Decodes the next value.
    pub fn decode_value(&mut self) -> Result<Value, ProtocolError> {
        let tag = self.take_u8("type tag")?;

        // positive fixint
        if tag <= 0x7f {
            return Ok(Value::UInt(tag as u64));
        }
        if tag & 0xf0 == FIXMAP_MASK {
            return self.decode_map((tag & 0x0f) as usize);
        }
        if tag & 0xf0 == FIXARRAY_MASK {
            return self.decode_array((tag & 0x0f) as usize);
        }
        if tag & 0xe0 == FIXSTR_MASK {
            return self.decode_str((tag & 0x1f) as usize);
        }

        match tag {
            TAG_NIL => Ok(Value::Nil),
            TAG_UINT8 => Ok(Value::UInt(self.take_u8("uint 8")? as u64)),
            TAG_UINT16 => Ok(Value::UInt(
                u16::from_be_bytes(self.take_array::<2>("uint 16")?) as u64,
            )),
            TAG_UINT32 => Ok(Value::UInt(
                u32::from_be_bytes(self.take_array::<4>("uint 32")?) as u64,
            )),
            TAG_UINT64 => Ok(Value::UInt(u64::from_be_bytes(
                self.take_array::<8>("uint 64")?,
            ))),
            TAG_INT8 => Ok(Value::Int(self.take_u8("int 8")? as i8 as i64)),
            TAG_INT16 => Ok(Value::Int(
                i16::from_be_bytes(self.take_array::<2>("int 16")?) as i64,
            )),
            TAG_INT32 => Ok(Value::Int(
                i32::from_be_bytes(self.take_array::<4>("int 32")?) as i64,
            )),
            TAG_INT64 => Ok(Value::Int(i64::from_be_bytes(
                self.take_array::<8>("int 64")?,
            ))),
            TAG_STR8 => {
                let len = self.take_u8("str 8 length")? as usize;
                self.decode_str(len)
            }
            TAG_BIN8 => {
                let len = self.take_u8("bin 8 length")? as usize;
                Ok(Value::Bin(self.take_slice(len, "bin 8 data")?.to_vec()))
            }
            TAG_MAP16 => {
                let len = u16::from_be_bytes(self.take_array::<2>("map 16 length")?) as usize;
                self.decode_map(len)
            }
            TAG_MAP32 => {
                let len = u32::from_be_bytes(self.take_array::<4>("map 32 length")?) as usize;
                self.decode_map(len)
            }
            other => Err(ProtocolError::UnsupportedTag(other)),
        }
    }

    fn decode_map(&mut self, len: usize) -> Result<Value, ProtocolError> {
        let mut entries = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }

    fn decode_array(&mut self, len: usize) -> Result<Value, ProtocolError> {
        let mut items = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            items.push(self.decode_value()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_str(&mut self, len: usize) -> Result<Value, ProtocolError> {
        let bytes = self.take_slice(len, "string data")?;
        let s = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(Value::Str(s.to_string()))
    }

    fn take_u8(&mut self, context: &'static str) -> Result<u8, ProtocolError> {
        let slice = self.take_slice(1, context)?;
        Ok(slice[0])
    }

    fn take_array<const N: usize>(
        &mut self,
        context: &'static str,
    ) -> Result<[u8; N], ProtocolError> {
        let slice = self.take_slice(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn take_slice(
        &mut self,
        len: usize,
        context: &'static str,
    ) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated {
                needed: len - self.remaining(),
                context,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(value: &Value) -> Value {
        let mut buf = BytesMut::new();
        encode_value(&mut buf, value).unwrap();
        let mut dec = Decoder::new(&buf);
        let out = dec.decode_value().unwrap();
        assert_eq!(dec.remaining(), 0);
        out
    }

    #[test]
    fn test_scalar_roundtrip() {
        for v in [
            Value::Nil,
            Value::UInt(0),
            Value::UInt(0xff),
            Value::UInt(0x8002),
            Value::UInt(u64::MAX),
            Value::Int(-1),
            Value::Int(i64::MIN),
            Value::Str("chap-sha1".into()),
            Value::Bin(vec![0xde, 0xad, 0xbe, 0xef]),
        ] {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn test_nested_roundtrip() {
        let v = Value::Map(vec![
            (Value::UInt(0x23), Value::Str("guest".into())),
            (
                Value::UInt(0x21),
                Value::Array(vec![
                    Value::Str("chap-sha1".into()),
                    Value::Bin(vec![0u8; 20]),
                ]),
            ),
        ]);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_fixint_decode() {
        // A server may encode small header keys as positive fixint.
        let mut dec = Decoder::new(&[0x00]);
        assert_eq!(dec.decode_value().unwrap(), Value::UInt(0));
        let mut dec = Decoder::new(&[0x7f]);
        assert_eq!(dec.decode_value().unwrap(), Value::UInt(0x7f));
    }

    #[test]
    fn test_str8_decode() {
        let mut buf = vec![TAG_STR8, 4];
        buf.extend_from_slice(b"oops");
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.decode_value().unwrap(), Value::Str("oops".into()));
    }

    #[test]
    fn test_map16_decode() {
        let buf = [TAG_MAP16, 0x00, 0x01, 0xcc, 0x00, 0xcc, 0x07];
        let mut dec = Decoder::new(&buf);
        let v = dec.decode_value().unwrap();
        assert_eq!(v.get(0x00).unwrap().as_uint().unwrap(), 0x07);
    }

    #[test]
    fn test_string_cap_enforced() {
        let mut buf = BytesMut::new();
        let long = "x".repeat(32);
        let err = encode_str(&mut buf, &long).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::StringTooLong { len: 32, max: 31 }
        ));
        // 31 bytes is still fine.
        encode_str(&mut buf, &"x".repeat(31)).unwrap();
    }

    #[test]
    fn test_truncated_input() {
        let mut dec = Decoder::new(&[TAG_UINT32, 0x00, 0x01]);
        let err = dec.decode_value().unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    #[test]
    fn test_unsupported_tag() {
        // 0xc1 is never used by the subset.
        let mut dec = Decoder::new(&[0xc1]);
        let err = dec.decode_value().unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedTag(0xc1)));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let buf = [FIXSTR_MASK | 2, 0xff, 0xfe];
        let mut dec = Decoder::new(&buf);
        let err = dec.decode_value().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8));
    }

    proptest! {
        #[test]
        fn prop_uint_width_roundtrip(v in any::<u64>()) {
            let mut buf = BytesMut::new();
            encode_uint(&mut buf, v);
            let mut dec = Decoder::new(&buf);
            prop_assert_eq!(dec.decode_value().unwrap(), Value::UInt(v));
            prop_assert_eq!(dec.remaining(), 0);
        }
    }
}
