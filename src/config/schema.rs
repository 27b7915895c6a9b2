//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the tunnel client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker address, shared secret and local backend.
    pub tunnel: TunnelConfig,

    /// Connection pool sizing and dial retry policy.
    pub pool: PoolConfig,

    /// Outbound HTTP client settings for the local backend.
    pub backend: BackendConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Where to connect and where to deliver relayed requests.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TunnelConfig {
    /// Broker address (e.g., "broker.example.com:8884").
    pub remote: String,

    /// Shared secret written once at the start of every tunnel connection.
    pub secret: Option<String>,

    /// Local backend, with or without scheme (e.g., "http://127.0.0.1:8080").
    pub local: String,

    /// Host header sent to the backend, overriding anything the broker relays.
    pub host: Option<String>,
}

impl TunnelConfig {
    /// Authority part of `local` ("127.0.0.1:8080"), empty when unset.
    pub fn local_host(&self) -> &str {
        let rest = match self.local.split_once("://") {
            Some((_, rest)) => rest,
            None => self.local.as_str(),
        };
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        rest[..end].trim()
    }

    /// Scheme part of `local`, if one was given.
    pub fn local_scheme(&self) -> Option<&str> {
        self.local
            .split_once("://")
            .map(|(scheme, _)| scheme.trim())
            .filter(|scheme| !scheme.is_empty())
    }

    /// The secret, treating an empty string as unset.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// The Host override, treating an empty string as unset.
    pub fn host_override(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }
}

/// Dial timeout used when none (or zero) is configured.
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 10;

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent tunnel connections (default: 2 x available CPUs).
    pub max_connections: Option<usize>,

    /// Delay after a failed dial in milliseconds.
    pub dial_retry_ms: u64,

    /// Random jitter added to the retry delay, as a fraction of it.
    pub retry_jitter: f64,

    /// Upper bound on a single TCP connect in seconds.
    pub dial_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: None,
            dial_retry_ms: 10_000,
            retry_jitter: 0.0,
            dial_timeout_secs: DEFAULT_DIAL_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    pub fn dial_retry(&self) -> Duration {
        Duration::from_millis(self.dial_retry_ms)
    }

    /// Zero means unset.
    pub fn dial_timeout(&self) -> Duration {
        match self.dial_timeout_secs {
            0 => Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Connection establishment timeout in seconds (0 disables it).
    pub connect_timeout_secs: u64,

    /// How long an idle backend connection is kept for reuse, in seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
