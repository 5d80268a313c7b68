//! # boxdb-client
//!
//! Client library for boxdb.
//!
//! This crate provides:
//! - Authenticated sessions over plain TCP (chap-sha1 handshake)
//! - A connection pool with round-robin host selection and ID recycling
//! - Cancellation- and timeout-bounded request round trips

pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod session;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::ClientError;
pub use pool::Pool;
pub use session::Session;
