//! Tunnel connection pool.
//!
//! # Responsibilities
//! - Keep up to `capacity` connections to the broker open, forever
//! - Retry failed dials after a fixed (optionally jittered) delay
//! - Start one session per connection and release its slot when it ends
//!
//! # Design Decisions
//! - A counting semaphore holds the capacity; a slot is taken before each
//!   dial and released by the connection's lease, so a finished session
//!   wakes the loop without polling
//! - No circuit breaker and no attempt limit: an unreachable broker just
//!   produces a steady stream of failure/backoff cycles
//! - No delay after a successful dial

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ClientConfig;
use crate::http::RequestRouter;
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionRegistry;
use crate::net::dialer;
use crate::observability::metrics;
use crate::resilience::backoff::RetryDelay;
use crate::tunnel::session::TunnelSession;

/// Two connections per available CPU.
pub fn default_capacity() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    cpus * 2
}

pub struct ConnectionPool {
    remote: String,
    secret: Option<Arc<str>>,
    capacity: usize,
    slots: Arc<Semaphore>,
    registry: Arc<ConnectionRegistry>,
    router: RequestRouter,
    retry: RetryDelay,
    dial_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(config: &ClientConfig, router: RequestRouter, registry: Arc<ConnectionRegistry>) -> Self {
        let capacity = config.pool.max_connections.unwrap_or_else(default_capacity).max(1);

        Self {
            remote: config.tunnel.remote.clone(),
            secret: config.tunnel.secret().map(Arc::from),
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            registry,
            router,
            retry: RetryDelay::new(config.pool.dial_retry(), config.pool.retry_jitter),
            dial_timeout: config.pool.dial_timeout(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Run the dial loop until shutdown is triggered.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            remote = %self.remote,
            capacity = self.capacity,
            retry_delay = ?self.retry.base(),
            "Connection pool starting"
        );

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.triggered() => break,
            };

            let dialed = tokio::select! {
                result = dialer::dial(&self.remote, self.dial_timeout) => result,
                _ = shutdown.triggered() => break,
            };

            match dialed {
                Ok((stream, peer)) => {
                    metrics::record_dial(true);
                    self.spawn_session(stream, peer, permit, shutdown.clone());
                }
                Err(e) => {
                    metrics::record_dial(false);
                    drop(permit);

                    let delay = self.retry.next_delay();
                    tracing::warn!(remote = %self.remote, error = %e, retry_in = ?delay, "Failed to dial broker");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.triggered() => break,
                    }
                }
            }
        }

        tracing::info!(active = self.registry.len(), "Connection pool stopped");
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, permit: OwnedSemaphorePermit, shutdown: ShutdownSignal) {
        let lease = self.registry.register(peer, permit);
        let session = TunnelSession::new(lease.id(), self.secret.clone(), self.router.clone());

        tracing::debug!(
            connection_id = %lease.id(),
            peer = %peer,
            active = self.registry.len(),
            "Tunnel session started"
        );

        tokio::spawn(async move {
            let end = session.run(stream, shutdown).await;
            end.log(lease.id());
            drop(lease);
        });
    }
}
