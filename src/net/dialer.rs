//! Outbound TCP dialing to the broker.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

/// Error type for dial attempts.
#[derive(Debug, Error)]
pub enum DialError {
    /// The connect did not complete in time.
    #[error("connect to {remote} timed out after {timeout:?}")]
    Timeout { remote: String, timeout: Duration },

    /// Resolution or connect failed.
    #[error("connect to {remote} failed: {source}")]
    Io {
        remote: String,
        #[source]
        source: std::io::Error,
    },
}

/// Open one tunnel connection to `remote`.
///
/// Returns the stream together with the broker's resolved address.
pub async fn dial(remote: &str, timeout: Duration) -> Result<(TcpStream, SocketAddr), DialError> {
    let io_err = |source| DialError::Io {
        remote: remote.to_string(),
        source,
    };

    let stream = tokio::time::timeout(timeout, TcpStream::connect(remote))
        .await
        .map_err(|_| DialError::Timeout {
            remote: remote.to_string(),
            timeout,
        })?
        .map_err(io_err)?;

    stream.set_nodelay(true).map_err(io_err)?;
    let peer = stream.peer_addr().map_err(io_err)?;

    tracing::debug!(remote = %remote, peer = %peer, "Tunnel connection established");
    Ok((stream, peer))
}
