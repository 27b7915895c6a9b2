//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Pool has a free slot
//!     → dialer.rs (TCP connect to the broker, bounded by a timeout)
//!     → connection.rs (register in the active set, lease tied to the session)
//!     → Hand off to the tunnel session
//!
//! Connection States:
//!     Dialing → Registered → Serving → Closed (lease dropped)
//! ```
//!
//! # Design Decisions
//! - Connections are only ever opened outbound
//! - Each connection tracked for capacity accounting
//! - Removal from the active set is tied to Drop, never done by hand

pub mod connection;
pub mod dialer;
