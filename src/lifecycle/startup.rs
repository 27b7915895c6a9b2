//! Startup checks.
//!
//! # Responsibilities
//! - Refuse to start without a local backend host
//! - Resolve the backend target once, before any connection attempt
//!
//! # Design Decisions
//! - Fail fast: the only fatal error of the client happens here
//! - Independent of file validation, so programmatic configs are checked too

use thiserror::Error;

use crate::config::TunnelConfig;
use crate::http::forwarder::BackendTarget;

/// Errors that prevent the tunnel from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// No local backend host configured.
    #[error("local host should not be empty")]
    EmptyLocalHost,

    /// The local backend could not be turned into a request target.
    #[error("invalid local backend `{local}`: {reason}")]
    InvalidLocal { local: String, reason: String },
}

/// Check the tunnel section and derive where requests are delivered.
pub fn backend_target(config: &TunnelConfig) -> Result<BackendTarget, StartupError> {
    let host = config.local_host();
    if host.is_empty() {
        return Err(StartupError::EmptyLocalHost);
    }

    BackendTarget::new(host, config.local_scheme(), config.host_override()).map_err(|reason| {
        StartupError::InvalidLocal {
            local: config.local.clone(),
            reason,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel(local: &str) -> TunnelConfig {
        TunnelConfig {
            remote: "127.0.0.1:8884".into(),
            local: local.into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_local_host_is_fatal() {
        assert!(matches!(backend_target(&tunnel("")), Err(StartupError::EmptyLocalHost)));
        assert!(matches!(backend_target(&tunnel("http://")), Err(StartupError::EmptyLocalHost)));
    }

    #[test]
    fn scheme_defaults_to_http() {
        let target = backend_target(&tunnel("127.0.0.1:8080")).unwrap();
        assert_eq!(target.scheme().as_str(), "http");
        assert_eq!(target.authority().as_str(), "127.0.0.1:8080");
    }

    #[test]
    fn rejects_unparsable_host() {
        assert!(matches!(
            backend_target(&tunnel("http://bad host")),
            Err(StartupError::InvalidLocal { .. })
        ));
    }
}
