//! Response decoding.

use crate::codec::Decoder;
use crate::error::ProtocolError;
use crate::frame::{decode_header, split_payload};
use crate::value::Value;
use crate::{key, response_code};

/// A server-reported error carried in an error-bit response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Low 12 bits of the response code.
    pub code: u16,
    /// Message text from the error body, verbatim.
    pub message: String,
}

/// A decoded response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Raw response code, error bit included.
    pub code: u64,
    /// Sync number echoed from the request.
    pub sync: u64,
    /// Schema version, when the server sent one.
    pub schema: Option<u64>,
    /// Body payload; an empty map on error responses.
    pub body: Value,
    /// Present when the response code had its error bit set.
    pub error: Option<ServerError>,
}

impl Response {
    /// Decodes a complete received frame.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let payload = split_payload(frame)?;
        let mut decoder = Decoder::new(payload);

        let header = decode_header(&mut decoder)?;
        let code = *header.get(&key::CODE).ok_or(ProtocolError::MissingCode)?;
        let sync = header.get(&key::SYNC).copied().unwrap_or(0);
        let schema = header.get(&key::SCHEMA).copied();

        let body = if decoder.remaining() > 0 {
            decoder.decode_value()?
        } else {
            Value::empty_map()
        };
        if decoder.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes {
                count: decoder.remaining(),
            });
        }

        if code & response_code::ERROR_MASK == 0 {
            return Ok(Self {
                code,
                sync,
                schema,
                body,
                error: None,
            });
        }

        // Error responses carry the message in the body, keyed by the
        // error key.
        let message = body
            .get(key::ERROR)
            .and_then(|v| v.as_str().ok())
            .ok_or(ProtocolError::MissingErrorMessage)?
            .to_string();
        Ok(Self {
            code,
            sync,
            schema,
            body: Value::empty_map(),
            error: Some(ServerError {
                code: (code & response_code::ERROR_CODE_MASK) as u16,
                message,
            }),
        })
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
