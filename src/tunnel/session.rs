//! One tunnel connection's request/response loop.
//!
//! # Responsibilities
//! - Write the shared secret line, once, before anything is read
//! - Parse relayed HTTP/1.1 requests off the connection one at a time
//! - Dispatch each through the router and write the reply back in order
//! - Report why the connection ended
//!
//! # Design Decisions
//! - One exchange at a time: request N+1 is not read before reply N is written
//! - Only the broker closing the socket, a wire error or shutdown ends the
//!   loop; the relayed request's own `Connection` header is not consulted
//! - Clean end-of-stream between requests is a normal close, not an error
//! - A request that cannot be parsed gets no reply; the session just ends

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::http::{RequestRouter, WireConnection, WireError};
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Errors that end a session abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Writing the secret line failed.
    #[error("secret handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// Reading, parsing or writing an exchange failed.
    #[error("tunnel connection error: {0}")]
    Wire(#[from] WireError),
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The broker closed the connection between exchanges.
    Closed,
    /// Shutdown was triggered.
    Cancelled,
    /// Any other termination.
    Failed(SessionError),
}

impl SessionEnd {
    pub fn reason(&self) -> &'static str {
        match self {
            SessionEnd::Closed => "closed",
            SessionEnd::Cancelled => "cancelled",
            SessionEnd::Failed(_) => "failed",
        }
    }

    /// Only `Failed` is logged as an error.
    pub fn log(&self, id: ConnectionId) {
        metrics::record_session_end(self.reason());
        match self {
            SessionEnd::Closed => tracing::debug!(connection_id = %id, "Tunnel connection closed by broker"),
            SessionEnd::Cancelled => tracing::debug!(connection_id = %id, "Tunnel connection shut down"),
            SessionEnd::Failed(e) => tracing::error!(connection_id = %id, error = %e, "Tunnel connection failed"),
        }
    }
}

/// Write the shared secret as a single newline-terminated line.
pub async fn handshake<S>(stream: &mut S, secret: &str) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(secret.len() + 1);
    line.extend_from_slice(secret.as_bytes());
    line.push(b'\n');
    stream.write_all(&line).await?;
    stream.flush().await
}

pub struct TunnelSession {
    id: ConnectionId,
    secret: Option<Arc<str>>,
    router: RequestRouter,
}

impl TunnelSession {
    pub fn new(id: ConnectionId, secret: Option<Arc<str>>, router: RequestRouter) -> Self {
        Self { id, secret, router }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serve exchanges on `stream` until it ends or shutdown is triggered.
    pub async fn run<S>(self, mut stream: S, mut shutdown: ShutdownSignal) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if let Some(secret) = &self.secret {
            if let Err(e) = handshake(&mut stream, secret).await {
                return SessionEnd::Failed(SessionError::Handshake(e));
            }
        }

        let mut wire = WireConnection::new(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.triggered() => return SessionEnd::Cancelled,
                next = wire.read_request() => next,
            };

            let request = match next {
                Ok(Some(request)) => request,
                Ok(None) => return SessionEnd::Closed,
                Err(e) => return SessionEnd::Failed(e.into()),
            };

            // An exchange already read is finished even if shutdown fires meanwhile.
            let response = self.router.route(request).await;
            if let Err(e) = wire.write_response(response).await {
                return SessionEnd::Failed(e.into());
            }
        }
    }
}
