//! chap-sha1 challenge-response authentication.
//!
//! The server never sees the password: the client proves knowledge of
//! it by XOR-ing a SHA1 chain of the password against a chain keyed by
//! the per-connection salt from the greeting.

use crate::error::ProtocolError;
use crate::request::{Header, Request};
use crate::value::Value;
use crate::{key, request_code};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::{Digest, Sha1};

/// Scramble length, fixed by SHA1's output size.
pub const SCRAMBLE_SIZE: usize = 20;

/// Authentication mechanism name sent in the AUTH body.
pub const MECHANISM: &str = "chap-sha1";

/// Derives the challenge response from the greeting salt and password.
///
/// The algorithm is fixed:
/// 1. base64-decode the salt; only the first 20 bytes are used
/// 2. step1 = SHA1(password)
/// 3. step2 = SHA1(step1)
/// 4. step3 = SHA1(salt[0..20] || step2)
/// 5. scramble[i] = step1[i] XOR step3[i]
pub fn scramble(salt_b64: &str, password: &str) -> Result<[u8; SCRAMBLE_SIZE], ProtocolError> {
    let salt = BASE64.decode(salt_b64)?;
    if salt.len() < SCRAMBLE_SIZE {
        return Err(ProtocolError::SaltTooShort {
            len: salt.len(),
            need: SCRAMBLE_SIZE,
        });
    }

    let step1 = Sha1::digest(password.as_bytes());
    let step2 = Sha1::digest(step1);

    let mut hasher = Sha1::new();
    hasher.update(&salt[..SCRAMBLE_SIZE]);
    hasher.update(step2);
    let step3 = hasher.finalize();

    let mut out = [0u8; SCRAMBLE_SIZE];
    for i in 0..SCRAMBLE_SIZE {
        out[i] = step1[i] ^ step3[i];
    }
    Ok(out)
}

/// The AUTH request sent once per connection, before any other traffic.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    username: String,
    scramble: [u8; SCRAMBLE_SIZE],
    sync: u64,
}

impl AuthRequest {
    /// Builds the AUTH request from the greeting salt and credentials.
    pub fn new(
        username: impl Into<String>,
        salt_b64: &str,
        password: &str,
        sync: u64,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            username: username.into(),
            scramble: scramble(salt_b64, password)?,
            sync,
        })
    }
}

impl Request for AuthRequest {
    fn header(&self) -> Header {
        Header::from([(key::CODE, request_code::AUTH), (key::SYNC, self.sync)])
    }

    fn body(&self) -> Value {
        Value::Map(vec![
            (
                Value::UInt(key::USERNAME as u64),
                Value::Str(self.username.clone()),
            ),
            (
                Value::UInt(key::TUPLE as u64),
                Value::Array(vec![
                    Value::Str(MECHANISM.into()),
                    Value::Bin(self.scramble.to_vec()),
                ]),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;

    // Pinned vector: salt = bytes 0x01..0x14 plus 4 bytes of padding,
    // password = "secret".
    const SALT_B64: &str = "AQIDBAUGBwgJCgsMDQ4PEBESExSqu8zd";
    const EXPECTED: [u8; SCRAMBLE_SIZE] = [
        0xb3, 0x2b, 0xb3, 0xa5, 0x83, 0xe1, 0x34, 0x0c, 0x0a, 0x11, 0x08, 0xd5, 0x8b, 0x1b,
        0xe4, 0x97, 0x81, 0xad, 0x8c, 0x2f,
    ];

    #[test]
    fn test_scramble_known_vector() {
        assert_eq!(scramble(SALT_B64, "secret").unwrap(), EXPECTED);
    }

    #[test]
    fn test_scramble_second_vector() {
        // 32-byte salt with zero padding, as servers typically send.
        let salt = "auXf28ky0aw15VoAiA1fnGLnYIUAAAAAAAAAAAAAAAA=";
        let expected: [u8; SCRAMBLE_SIZE] = [
            0x8e, 0x9e, 0xff, 0x35, 0xc6, 0xfc, 0xfc, 0xd1, 0xdf, 0x18, 0x66, 0xef, 0xc7,
            0xfa, 0x9a, 0x08, 0x72, 0x3d, 0x01, 0xbc,
        ];
        assert_eq!(scramble(salt, "s3cr3t-pass").unwrap(), expected);
    }

    #[test]
    fn test_scramble_deterministic() {
        let a = scramble(SALT_B64, "secret").unwrap();
        let b = scramble(SALT_B64, "secret").unwrap();
        assert_eq!(a, b);
        assert_ne!(scramble(SALT_B64, "other").unwrap(), a);
    }

    #[test]
    fn test_malformed_salt() {
        let err = scramble("not base64!!", "secret").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidSalt(_)));
    }

    #[test]
    fn test_salt_too_short() {
        // 12 decoded bytes, below the 20 the algorithm consumes.
        let err = scramble("AAAAAAAAAAAAAAAA", "secret").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::SaltTooShort { len: 12, need: 20 }
        ));
    }

    #[test]
    fn test_auth_request_layout() {
        let auth = AuthRequest::new("guest", SALT_B64, "secret", 1).unwrap();

        let header = auth.header();
        assert_eq!(header[&key::CODE], request_code::AUTH);
        assert_eq!(header[&key::SYNC], 1);

        let body = auth.body();
        assert_eq!(body.get(key::USERNAME).unwrap().as_str().unwrap(), "guest");
        let tuple = body.get(key::TUPLE).unwrap().as_array().unwrap();
        assert_eq!(tuple[0].as_str().unwrap(), MECHANISM);
        assert_eq!(tuple[1].as_bin().unwrap(), EXPECTED);
    }

    #[test]
    fn test_auth_body_bytes() {
        // Byte-level pin of the fixed-form body layout.
        let auth = AuthRequest::new("guest", SALT_B64, "secret", 1).unwrap();
        let frame = frame::encode_request(&auth).unwrap();
        let payload = frame::split_payload(&frame).unwrap();

        // Header: fixmap(2) {u8 0x00: u8 0x07, u8 0x01: u8 0x01}.
        assert_eq!(
            &payload[..9],
            &[0x82, 0xcc, 0x00, 0xcc, 0x07, 0xcc, 0x01, 0xcc, 0x01]
        );
        // Body: fixmap(2), u8 username key, fixstr(5) "guest".
        let body = &payload[9..];
        assert_eq!(&body[..4], &[0x82, 0xcc, 0x23, 0xa5]);
        assert_eq!(&body[4..9], b"guest");
        // u8 tuple key, fixarray(2), fixstr(9) "chap-sha1", bin8(20).
        assert_eq!(&body[9..13], &[0xcc, 0x21, 0x92, 0xa9]);
        assert_eq!(&body[13..22], b"chap-sha1");
        assert_eq!(&body[22..24], &[0xc4, 0x14]);
        assert_eq!(&body[24..], EXPECTED);
    }

    #[test]
    fn test_username_cap() {
        let auth = AuthRequest::new("x".repeat(32), SALT_B64, "secret", 1).unwrap();
        let err = frame::encode_request(&auth).unwrap_err();
        assert!(matches!(err, ProtocolError::StringTooLong { len: 32, .. }));
    }
}
