//! High-level client API.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::pool::Pool;
use crate::session::Session;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// High-level client over a pooled cluster connection.
pub struct Client {
    pool: Pool,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            pool: Pool::new(config),
        }
    }

    /// Points the client at a cluster and establishes one pooled
    /// session, so dial and authentication failures surface here.
    ///
    /// Any previously pooled sessions are closed first.
    pub async fn connect_to(
        &self,
        cancel: &CancellationToken,
        hosts: Vec<String>,
    ) -> Result<(), ClientError> {
        self.pool.set_hosts(hosts).await?;
        self.pool.acquire(cancel).await?;
        Ok(())
    }

    /// Obtains a ready session for issuing requests.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Arc<Session>, ClientError> {
        self.pool.acquire(cancel).await
    }

    /// Closes every pooled session.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.pool.close().await
    }

    /// The underlying pool (introspection and host management).
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}
