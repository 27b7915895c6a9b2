//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool, sessions and forwarder produce:
//!     → logging.rs (structured log events, access log)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
