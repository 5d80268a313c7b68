//! Client configuration.

use std::time::Duration;

/// Default round-trip timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by every session a client opens.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Username for the chap-sha1 handshake. Empty skips
    /// authentication entirely.
    pub username: String,
    /// Password for the chap-sha1 handshake.
    pub password: String,
    /// Bound on one full round trip (and on connect + handshake).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the round-trip timeout. A zero duration falls back to the
    /// 30-second default.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = if timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            timeout
        };
        self
    }
}
