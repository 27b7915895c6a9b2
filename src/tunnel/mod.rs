//! Reverse tunnel to a broker.
//!
//! # Data Flow
//! ```text
//! Tunnel::run
//!     → pool.rs (dial broker up to capacity, retry on failure)
//!     → session.rs (secret line, then request → router → response, repeated)
//!     → session ends → lease dropped → slot free → pool dials a replacement
//! ```
//!
//! # Design Decisions
//! - One task per tunnel connection plus one for the pool loop
//! - The connection registry is the only shared mutable state
//! - Exchanges on one connection are strictly sequential

pub mod pool;
pub mod session;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ClientConfig;
use crate::http::{Forwarder, RequestRouter};
use crate::lifecycle::startup;
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionRegistry;

pub use crate::lifecycle::StartupError;
pub use pool::ConnectionPool;
pub use session::{SessionEnd, SessionError, TunnelSession};

/// How long `run` waits for sessions to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// The tunnel client: configuration plus its live connections.
pub struct Tunnel {
    config: ClientConfig,
    registry: Arc<ConnectionRegistry>,
    pool: ConnectionPool,
}

impl Tunnel {
    /// Check the configuration and prepare the pool. Nothing is dialed yet.
    pub fn new(config: ClientConfig) -> Result<Self, StartupError> {
        let target = startup::backend_target(&config.tunnel)?;
        let router = RequestRouter::new(Forwarder::new(target, &config.backend));
        let registry = Arc::new(ConnectionRegistry::new());
        let pool = ConnectionPool::new(&config, router, Arc::clone(&registry));

        Ok(Self { config, registry, pool })
    }

    /// Keep the tunnel up until shutdown, then wait for sessions to finish.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        self.pool.run(shutdown).await;
        self.wait_for_drain(DRAIN_TIMEOUT).await;
    }

    /// Wait until every session has ended, or `timeout` elapses.
    pub async fn wait_for_drain(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.registry.is_empty() {
            if Instant::now() >= deadline {
                tracing::warn!(active = self.registry.len(), "Tunnel connections still open after drain timeout");
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
