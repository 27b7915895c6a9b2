//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared via Arc with the pool and every session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the tunnel never reloads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BackendConfig;
pub use schema::ClientConfig;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use schema::TunnelConfig;
