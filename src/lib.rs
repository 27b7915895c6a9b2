//! Reverse tunnel client library.
//!
//! Keeps outbound connections open to a tunnel broker, serves the HTTP
//! requests the broker relays over them from a local backend, and writes
//! each response back onto the connection it came from.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod tunnel;

pub use config::schema::ClientConfig;
pub use lifecycle::Shutdown;
pub use tunnel::Tunnel;
