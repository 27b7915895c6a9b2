//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject the one configuration the tunnel cannot run with: no local host
//! - Report tuning values that are out of range and how they are adjusted
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Out-of-range tuning values are warnings, never fatal; the consumers
//!   clamp them (pool capacity, retry jitter, dial timeout)
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{ClientConfig, DEFAULT_DIAL_TIMEOUT_SECS};

/// A configuration the tunnel refuses to start with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("local host should not be empty")]
    EmptyLocalHost,
}

/// A configuration value that is ignored or adjusted at runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationWarning {
    #[error("tunnel.remote is empty; every dial will fail and be retried")]
    EmptyRemote,

    #[error("local scheme `{0}` is neither http nor https; backend requests will be answered with 502")]
    UnsupportedScheme(String),

    #[error("pool.max_connections is 0; using 1")]
    ZeroMaxConnections,

    #[error("pool.retry_jitter {0} is outside [0.0, 1.0]; clamped")]
    JitterOutOfRange(f64),

    #[error("pool.dial_timeout_secs is 0; using {DEFAULT_DIAL_TIMEOUT_SECS}s")]
    ZeroDialTimeout,
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tunnel.local_host().is_empty() {
        errors.push(ValidationError::EmptyLocalHost);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Values the tunnel runs with anyway, after adjusting them.
pub fn config_warnings(config: &ClientConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if config.tunnel.remote.trim().is_empty() {
        warnings.push(ValidationWarning::EmptyRemote);
    }

    if let Some(scheme) = config.tunnel.local_scheme() {
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            warnings.push(ValidationWarning::UnsupportedScheme(scheme.to_string()));
        }
    }

    if config.pool.max_connections == Some(0) {
        warnings.push(ValidationWarning::ZeroMaxConnections);
    }

    if !(0.0..=1.0).contains(&config.pool.retry_jitter) {
        warnings.push(ValidationWarning::JitterOutOfRange(config.pool.retry_jitter));
    }

    if config.pool.dial_timeout_secs == 0 {
        warnings.push(ValidationWarning::ZeroDialTimeout);
    }

    warnings
}
