//! HTTP handling for relayed exchanges.
//!
//! # Data Flow
//! ```text
//! Request parsed off a tunnel connection (wire.rs)
//!     → router.rs (diagnostic ping answered directly)
//!     → forwarder.rs (rewrite target + Host, call local backend)
//!     → response.rs (buffer body, force keep-alive, or synthesize 502)
//!     → wire.rs writes it back onto the same connection
//! ```

pub mod forwarder;
pub mod response;
pub mod router;
pub mod wire;

pub use forwarder::{BackendTarget, Forwarder};
pub use router::RequestRouter;
pub use wire::{WireConnection, WireError};
