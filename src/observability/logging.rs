//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable through RUST_LOG
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Access log events use the `reverse_tunnel::access` target so they can be filtered apart

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target of the per-request access log.
pub const ACCESS_TARGET: &str = "reverse_tunnel::access";

/// Filter used when RUST_LOG is not set.
pub fn default_filter(level: &str) -> String {
    format!("reverse_tunnel={level},hyper=warn,hyper_util=warn")
}

/// Install the global subscriber.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("logging already initialized: {e}");
    }
}
