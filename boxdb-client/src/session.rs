//! Session management.
//!
//! A session owns exactly one TCP connection and drives its lifecycle:
//! connect, read the greeting, authenticate, serve round trips, close.
//! Round trips are strictly serialized; concurrent callers queue on the
//! stream mutex rather than racing the wire.

use crate::config::ClientConfig;
use crate::error::ClientError;
use boxdb_protocol::{frame, AuthRequest, Request, Response};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Read chunk size for the frame read loop.
const READ_CHUNK_SIZE: usize = 1024;

/// Greeting lines never exceed this.
const MAX_GREETING_LINE: usize = 128;

/// Poll interval for readiness waits.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One authenticated connection to a cluster host.
#[derive(Debug)]
pub struct Session {
    addr: String,
    username: String,
    password: String,
    timeout: Duration,
    /// The stream, held for the duration of connect, one round trip, or
    /// close. `None` before connect and after close.
    io: Mutex<Option<TcpStream>>,
    /// Flips false→true once on successful connect+auth, true→false
    /// once on close.
    connected: AtomicBool,
    closed: AtomicBool,
    close_notify: Notify,
    sync: AtomicU64,
}

impl Session {
    /// Creates a session targeting `addr`. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(addr: impl Into<String>, config: &ClientConfig) -> Self {
        Self {
            addr: addr.into(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.request_timeout,
            io: Mutex::new(None),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            sync: AtomicU64::new(1),
        }
    }

    /// Remote address this session targets.
    pub fn remote_addr(&self) -> &str {
        &self.addr
    }

    /// Whether the session is ready for requests.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Next sync number for a request header.
    pub fn next_sync(&self) -> u64 {
        self.sync.fetch_add(1, Ordering::SeqCst)
    }

    /// Dials, reads the greeting, and authenticates.
    ///
    /// The whole sequence is bounded by the configured timeout and by
    /// `cancel`. The session only becomes ready after the handshake
    /// succeeds; with an empty username the handshake is skipped.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let mut io = self.io.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionClosed);
        }
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            res = tokio::time::timeout(self.timeout, self.establish()) => match res {
                Ok(inner) => inner,
                Err(_) => Err(ClientError::Timeout),
            },
        };

        let stream = result?;
        *io = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(addr = %self.addr, "session ready");
        Ok(())
    }

    async fn establish(&self) -> Result<TcpStream, ClientError> {
        tracing::debug!(addr = %self.addr, "connecting");
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true).ok();

        // Two text lines precede binary traffic: a banner, then the
        // base64 salt.
        let _banner = read_line(&mut stream).await?;
        let salt_line = read_line(&mut stream).await?;

        if !self.username.is_empty() {
            let salt = salt_line.trim_end_matches([' ', '\r', '\n']);
            let auth =
                AuthRequest::new(self.username.as_str(), salt, &self.password, self.next_sync())?;
            let bytes = frame::encode_request(&auth)?;
            stream.write_all(&bytes).await?;

            let reply = read_frame(&mut stream).await?;
            let response = Response::decode(&reply)?;
            if let Some(err) = response.error {
                tracing::debug!(code = err.code, "authentication rejected");
                return Err(ClientError::Auth {
                    code: err.code,
                    message: err.message,
                });
            }
            tracing::debug!(user = %self.username, "authenticated");
        }

        Ok(stream)
    }

    /// Performs one request/response round trip.
    ///
    /// At most one round trip is in flight at a time; concurrent
    /// callers wait for exclusive access to the stream. A cancelled or
    /// timed-out round trip leaves the stream in an unknown state, so
    /// the session is torn down before the error is returned. An
    /// error-bit response is not a session fault; it is returned in the
    /// decoded [`Response`].
    pub async fn request(
        &self,
        cancel: &CancellationToken,
        request: &impl Request,
    ) -> Result<Response, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        self.wait_ready(cancel).await?;

        // Encoding failures leave the session intact: nothing has
        // touched the wire yet.
        let bytes = frame::encode_request(request)?;

        let mut io = self.io.lock().await;
        let stream = io.as_mut().ok_or(ClientError::NotConnected)?;

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            res = tokio::time::timeout(self.timeout, round_trip(stream, &bytes)) => match res {
                Ok(inner) => inner,
                Err(_) => Err(ClientError::Timeout),
            },
        };

        match result {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::debug!(addr = %self.addr, error = %err, "round trip failed");
                self.tear_down(&mut io).await;
                Err(err)
            }
        }
    }

    /// Like [`request`](Self::request), but converts an error-bit
    /// response into a typed error.
    pub async fn call(
        &self,
        cancel: &CancellationToken,
        request: &impl Request,
    ) -> Result<Response, ClientError> {
        let response = self.request(cancel, request).await?;
        match response.error {
            Some(err) => Err(ClientError::Server {
                code: err.code,
                message: err.message,
            }),
            None => Ok(response),
        }
    }

    /// Blocks until the session is ready, the configured deadline
    /// passes, or `cancel` fires, whichever comes first.
    pub async fn wait_ready(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ClientError::ConnectionClosed);
            }
            if self.connected.load(Ordering::SeqCst) {
                return Ok(());
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Err(ClientError::Timeout),
                _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }
    }

    /// Closes the session. Idempotent; closing a session that never
    /// connected is a no-op. Waits out any in-flight round trip.
    pub async fn close(&self) -> Result<(), ClientError> {
        let mut io = self.io.lock().await;
        if !self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(addr = %self.addr, "closing session");
        self.tear_down(&mut io).await;
        Ok(())
    }

    /// Resolves once the session has closed. The signal fires exactly
    /// once, whether the close was explicit or a fatal I/O teardown.
    pub async fn closed(&self) {
        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a teardown between the
        // check and the await cannot be missed.
        notified.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    async fn tear_down(&self, io: &mut Option<TcpStream>) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut stream) = io.take() {
            let _ = stream.shutdown().await;
        }
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.close_notify.notify_waiters();
        }
    }
}

async fn round_trip(stream: &mut TcpStream, request_bytes: &[u8]) -> Result<Response, ClientError> {
    stream.write_all(request_bytes).await?;
    let reply = read_frame(stream).await?;
    Ok(Response::decode(&reply)?)
}

/// Reads one frame: chunks are appended until end-of-stream or a short
/// read marks the final chunk.
async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>, ClientError> {
    let mut frame = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if frame.is_empty() {
                return Err(ClientError::ConnectionClosed);
            }
            break;
        }
        frame.extend_from_slice(&chunk[..n]);
        if n < chunk.len() {
            break;
        }
    }
    Ok(frame)
}

/// Reads a single newline-terminated text line, one byte at a time so
/// no bytes of the binary stream that follows are consumed.
async fn read_line(stream: &mut TcpStream) -> Result<String, ClientError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        line.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
        if line.len() > MAX_GREETING_LINE {
            return Err(ClientError::Protocol(
                boxdb_protocol::ProtocolError::Truncated {
                    needed: 1,
                    context: "greeting line terminator",
                },
            ));
        }
    }
    String::from_utf8(line).map_err(|_| {
        ClientError::Protocol(boxdb_protocol::ProtocolError::InvalidUtf8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig::new().with_credentials("guest", "secret")
    }

    #[tokio::test]
    async fn test_close_never_connected_is_noop() {
        let session = Session::new("127.0.0.1:1", &test_config());
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_request_before_connect_times_out() {
        let config = test_config().with_request_timeout(Duration::from_millis(50));
        let session = Session::new("127.0.0.1:1", &config);
        let cancel = CancellationToken::new();
        let err = session
            .request(&cancel, &boxdb_protocol::Call::ping(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }

    #[tokio::test]
    async fn test_precancelled_request() {
        let session = Session::new("127.0.0.1:1", &test_config());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = session
            .request(&cancel, &boxdb_protocol::Call::ping(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }

    #[tokio::test]
    async fn test_wait_ready_cancelled() {
        let session = Session::new("127.0.0.1:1", &test_config());
        let cancel = CancellationToken::new();
        let waiter = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let session = session;
                session.wait_ready(&cancel).await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn test_closed_signal_fires_once() {
        let session = std::sync::Arc::new(Session::new("127.0.0.1:1", &test_config()));
        // Never-connected close is a no-op, so the signal must still be
        // pending for a later real teardown.
        session.close().await.unwrap();
        assert!(!session.is_closed());

        let waiter = tokio::spawn({
            let session = session.clone();
            async move { session.closed().await }
        });
        let mut io = session.io.lock().await;
        session.tear_down(&mut io).await;
        drop(io);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() must resolve")
            .unwrap();

        // Waiting after the fact resolves immediately.
        tokio::time::timeout(Duration::from_secs(1), session.closed())
            .await
            .expect("closed() must resolve for late waiters");
    }

    #[tokio::test]
    async fn test_next_sync_monotonic() {
        let session = Session::new("127.0.0.1:1", &test_config());
        let a = session.next_sync();
        let b = session.next_sync();
        assert!(b > a);
    }
}
