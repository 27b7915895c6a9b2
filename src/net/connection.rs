//! Tunnel connection identity and the active-connection registry.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track which tunnel connections are live (add, remove-by-identity, count)
//! - Tie a connection's registry entry and pool slot to its session's lifetime

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tunnel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A registry entry. The socket itself is owned by the session task.
#[derive(Debug, Clone)]
pub struct ActiveConnection {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub opened_at: Instant,
}

/// The set of live tunnel connections, shared by the pool and its sessions.
///
/// Every read and mutation goes through the one lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Mutex<Vec<ActiveConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ActiveConnection>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a connection and return its new ID.
    pub fn add(&self, peer: SocketAddr) -> ConnectionId {
        let id = ConnectionId::new();
        let mut entries = self.lock();
        entries.push(ActiveConnection {
            id,
            peer,
            opened_at: Instant::now(),
        });
        metrics::set_active_connections(entries.len());
        id
    }

    /// Remove one connection by identity. Returns whether it was present.
    ///
    /// Everything except `id` is kept, so an unknown id leaves the set untouched.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        metrics::set_active_connections(entries.len());
        entries.len() != before
    }

    /// Current number of live connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().iter().any(|entry| entry.id == id)
    }

    /// Copy of the current entries, for diagnostics.
    pub fn snapshot(&self) -> Vec<ActiveConnection> {
        self.lock().clone()
    }

    /// Register a connection and hand back the guard that unregisters it.
    pub fn register(self: &Arc<Self>, peer: SocketAddr, permit: OwnedSemaphorePermit) -> ConnectionLease {
        let id = self.add(peer);
        tracing::trace!(connection_id = %id, peer = %peer, "Connection registered");
        ConnectionLease {
            id,
            registry: Arc::clone(self),
            _permit: permit,
        }
    }
}

/// Guard that tracks a tunnel connection's lifetime.
///
/// Dropping it removes the connection from the registry, then releases its
/// pool slot. Drop runs once, so removal happens exactly once.
#[derive(Debug)]
pub struct ConnectionLease {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionLease {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if !self.registry.remove(self.id) {
            tracing::warn!(connection_id = %self.id, "Connection was not registered");
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
