//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing, encoding, or
/// decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid length prefix tag: expected 0xce, got {0:#04x}")]
    InvalidLengthTag(u8),

    #[error("frame length mismatch: declared {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("{count} trailing bytes after payload")]
    TrailingBytes { count: usize },

    #[error("unsupported type tag {0:#04x}")]
    UnsupportedTag(u8),

    #[error("truncated input: need {needed} more bytes for {context}")]
    Truncated {
        needed: usize,
        context: &'static str,
    },

    #[error("string too long for fixed form: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("binary blob too long: {len} bytes (max {max})")]
    BinaryTooLong { len: usize, max: usize },

    #[error("map too large for fixed form: {len} entries (max {max})")]
    MapTooLarge { len: usize, max: usize },

    #[error("array too large for fixed form: {len} entries (max {max})")]
    ArrayTooLarge { len: usize, max: usize },

    #[error("header key is not a single byte: {0:?}")]
    InvalidHeaderKey(crate::value::Value),

    #[error("header is not a map")]
    InvalidHeader,

    #[error("response code missing from header")]
    MissingCode,

    #[error("error body is missing a message")]
    MissingErrorMessage,

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("malformed base64 salt: {0}")]
    InvalidSalt(#[from] base64::DecodeError),

    #[error("salt too short: {len} bytes (need {need})")]
    SaltTooShort { len: usize, need: usize },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}
