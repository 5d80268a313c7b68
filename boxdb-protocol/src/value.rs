//! Tagged value model for decoded wire data.
//!
//! Everything the codec reads off the wire lands in a [`Value`]. The
//! projection methods are checked: asking a map for a string yields a
//! `TypeMismatch` instead of a loose downcast.

use crate::error::ProtocolError;

/// A decoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    UInt(u64),
    Int(i64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    /// Key/value pairs in wire order. Duplicate keys are preserved.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::UInt(_) => "unsigned integer",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::Bin(_) => "binary",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Projects to an unsigned integer. Signed values are accepted when
    /// non-negative.
    pub fn as_uint(&self) -> Result<u64, ProtocolError> {
        match self {
            Value::UInt(v) => Ok(*v),
            Value::Int(v) if *v >= 0 => Ok(*v as u64),
            other => Err(ProtocolError::TypeMismatch {
                expected: "unsigned integer",
                actual: other.type_name(),
            }),
        }
    }

    /// Projects to a single byte, the form header map keys must take.
    pub fn as_key_byte(&self) -> Result<u8, ProtocolError> {
        match self.as_uint() {
            Ok(v) if v <= u8::MAX as u64 => Ok(v as u8),
            _ => Err(ProtocolError::InvalidHeaderKey(self.clone())),
        }
    }

    pub fn as_str(&self) -> Result<&str, ProtocolError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(ProtocolError::TypeMismatch {
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }

    pub fn as_bin(&self) -> Result<&[u8], ProtocolError> {
        match self {
            Value::Bin(b) => Ok(b),
            other => Err(ProtocolError::TypeMismatch {
                expected: "binary",
                actual: other.type_name(),
            }),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], ProtocolError> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(ProtocolError::TypeMismatch {
                expected: "array",
                actual: other.type_name(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&[(Value, Value)], ProtocolError> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(ProtocolError::TypeMismatch {
                expected: "map",
                actual: other.type_name(),
            }),
        }
    }

    /// Looks up a map entry by single-byte key.
    pub fn get(&self, key: u8) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k.as_uint(), Ok(v) if v == key as u64))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// An empty map, the placeholder body of decoded error responses.
    pub fn empty_map() -> Self {
        Value::Map(Vec::new())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bin(v)
    }
}
