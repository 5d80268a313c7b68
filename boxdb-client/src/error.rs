//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] boxdb_protocol::ProtocolError),

    #[error("empty cluster: no hosts configured")]
    EmptyCluster,

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("authentication failed: error #{code}: {message}")]
    Auth { code: u16, message: String },

    #[error("server error #{code}: {message}")]
    Server { code: u16, message: String },
}
