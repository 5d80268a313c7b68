//! Request envelope types.

use crate::value::Value;
use crate::{key, request_code};
use std::collections::BTreeMap;

/// Request/response header: single-byte keys to integer values.
pub type Header = BTreeMap<u8, u64>;

/// Anything that can be sent as one wire request.
///
/// A header must carry at least the request code and a sync number; the
/// body is an arbitrary value the server interprets per request code.
pub trait Request {
    fn header(&self) -> Header;
    fn body(&self) -> Value;
}

/// A generic request for arbitrary round trips.
#[derive(Debug, Clone)]
pub struct Call {
    pub code: u64,
    pub sync: u64,
    pub body: Value,
}

impl Call {
    pub fn new(code: u64, sync: u64) -> Self {
        Self {
            code,
            sync,
            body: Value::empty_map(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// A ping round trip.
    pub fn ping(sync: u64) -> Self {
        Self::new(request_code::PING, sync)
    }
}

impl Request for Call {
    fn header(&self) -> Header {
        Header::from([(key::CODE, self.code), (key::SYNC, self.sync)])
    }

    fn body(&self) -> Value {
        self.body.clone()
    }
}
