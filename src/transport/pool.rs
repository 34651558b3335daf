//! Session pool keyed by dial target.
//!
//! # Responsibilities
//! - Hold at most one live SSH session per [`DestinationKey`]
//! - Arbitrate session creation per key (single-flight dial)
//! - Evict sessions whose transport has failed
//!
//! # Design Decisions
//! - The map value is the *dial itself* as a shared future, not the session:
//!   concurrent requests for the same key await one handshake and share its
//!   outcome, success or failure, instead of racing N handshakes.
//! - A failed dial is removed from the map, so the pool keeps no record of
//!   failures; the next request starts a fresh dial.
//! - Eviction is by session id, so a request reporting a dead session can
//!   never knock out the replacement that another request already created.
//! - Keys are arbitrated independently; unrelated destinations never contend
//!   beyond a map shard.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use uuid::Uuid;

use crate::transport::error::TransportError;
use crate::transport::session::{DestinationKey, SecureSession};

/// The pool's view of a session: identity plus liveness.
pub trait PoolableSession: Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn is_open(&self) -> bool;
}

impl PoolableSession for SecureSession {
    fn id(&self) -> Uuid {
        self.id()
    }

    fn is_open(&self) -> bool {
        self.is_open()
    }
}

/// An in-flight or completed dial, shared between waiters.
type Flight<S> = Shared<BoxFuture<'static, Result<Arc<S>, Arc<TransportError>>>>;

/// One authenticated session per destination, created at most once
/// concurrently.
pub struct SessionPool<S = SecureSession> {
    sessions: DashMap<DestinationKey, Flight<S>>,
}

impl<S: PoolableSession> SessionPool<S> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Get the live session for `key`, dialing if necessary.
    ///
    /// `dial` is invoked at most once per handshake attempt; concurrent
    /// callers for the same key wait on that attempt and observe its result.
    /// Sessions found closed are evicted and re-dialed transparently.
    pub async fn acquire<D, F>(
        &self,
        key: &DestinationKey,
        dial: D,
    ) -> Result<Arc<S>, TransportError>
    where
        D: Fn() -> F,
        F: Future<Output = Result<S, TransportError>> + Send + 'static,
    {
        loop {
            // Resolve the flight to await without holding the shard lock
            // across the await point.
            let flight = match self.sessions.entry(key.clone()) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    let dialing = dial();
                    let flight: Flight<S> = async move {
                        dialing.await.map(Arc::new).map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    entry.insert(flight.clone());
                    flight
                }
            };

            match flight.clone().await {
                Ok(session) => {
                    if session.is_open() {
                        return Ok(session);
                    }
                    tracing::debug!(destination = %key, session = %session.id(), "pooled session is closed, re-dialing");
                    self.evict(key, session.id());
                }
                Err(err) => {
                    self.sessions
                        .remove_if(key, |_, existing| existing.ptr_eq(&flight));
                    return Err(TransportError::Pooled(err));
                }
            }
        }
    }

    /// Remove the session for `key` if it is still the one identified by
    /// `session_id`. In-flight dials and newer replacements are untouched.
    pub fn evict(&self, key: &DestinationKey, session_id: Uuid) {
        let removed = self.sessions.remove_if(key, |_, flight| {
            matches!(flight.peek(), Some(Ok(session)) if session.id() == session_id)
        });
        if removed.is_some() {
            tracing::info!(destination = %key, session = %session_id, "session evicted");
            crate::observability::metrics::record_session_eviction();
        }
    }

    /// Number of pooled entries (live sessions plus in-flight dials).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S: PoolableSession> Default for SessionPool<S> {
    fn default() -> Self {
        Self::new()
    }
}
