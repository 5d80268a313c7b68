//! Connection pool.
//!
//! The pool owns the cluster host list and a registry of live sessions
//! keyed by recycled integer IDs. Hosts are picked round robin: the
//! front of the list is dialed and moved to the back. Every pooled
//! session gets a watcher task that returns its ID to the free list
//! once the session signals closure.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::Session;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A pool of authenticated sessions across a rotating host list.
pub struct Pool {
    config: ClientConfig,
    inner: Arc<Mutex<PoolInner>>,
    /// Pool-wide cancellation for watcher tasks, fired on drop.
    shutdown: CancellationToken,
}

struct PoolInner {
    hosts: VecDeque<String>,
    sessions: HashMap<u64, Arc<Session>>,
    /// Previously used IDs, reused oldest first.
    free_ids: VecDeque<u64>,
    /// Hands out fresh IDs once the free list is exhausted.
    next_id: u64,
}

impl Pool {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(PoolInner {
                hosts: VecDeque::new(),
                sessions: HashMap::new(),
                free_ids: VecDeque::new(),
                next_id: 0,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the host list. All currently pooled sessions are closed
    /// first; every close is attempted and the first error is reported.
    pub async fn set_hosts(&self, hosts: Vec<String>) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        let result = close_all(&mut inner).await;
        inner.hosts = hosts.into();
        tracing::debug!(hosts = inner.hosts.len(), "host list replaced");
        result
    }

    /// Dials and authenticates a session against the next host in
    /// round-robin order, registers it, and returns it.
    ///
    /// The returned session is always ready; a session that fails to
    /// connect or authenticate is never pooled.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Arc<Session>, ClientError> {
        let addr = {
            let mut inner = self.inner.lock().await;
            let addr = inner.hosts.pop_front().ok_or(ClientError::EmptyCluster)?;
            inner.hosts.push_back(addr.clone());
            addr
        };

        let session = Arc::new(Session::new(addr, &self.config));
        session.connect(cancel).await?;

        let id = {
            let mut inner = self.inner.lock().await;
            let id = match inner.free_ids.pop_front() {
                Some(id) => id,
                None => {
                    let id = inner.next_id;
                    inner.next_id += 1;
                    id
                }
            };
            inner.sessions.insert(id, session.clone());
            id
        };
        self.spawn_watcher(id, session.clone());
        tracing::debug!(id, addr = %session.remote_addr(), "session pooled");
        Ok(session)
    }

    /// Closes every registered session. All closes are attempted; the
    /// first error is reported. Free-ID bookkeeping survives, so the
    /// pool remains usable afterwards.
    pub async fn close(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        close_all(&mut inner).await
    }

    /// Number of live pooled sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// IDs of live pooled sessions, ascending.
    pub async fn session_ids(&self) -> Vec<u64> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<u64> = inner.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn spawn_watcher(&self, id: u64, session: Arc<Session>) {
        let inner = Arc::clone(&self.inner);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = session.closed() => {
                    let mut inner = inner.lock().await;
                    // Another path may have reclaimed the ID already.
                    if inner.sessions.remove(&id).is_some() {
                        inner.free_ids.push_back(id);
                        tracing::debug!(id, "session reclaimed");
                    }
                }
            }
        });
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn close_all(inner: &mut PoolInner) -> Result<(), ClientError> {
    let mut ids: Vec<u64> = inner.sessions.keys().copied().collect();
    ids.sort_unstable();

    let mut first_err = None;
    for id in ids {
        if let Some(session) = inner.sessions.remove(&id) {
            if let Err(err) = session.close().await {
                tracing::warn!(id, error = %err, "closing pooled session failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
            inner.free_ids.push_back(id);
        }
    }
    match first_err {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
