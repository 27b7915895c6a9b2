//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Resolve backend target → Start pool loop
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Pool stops dialing → Sessions finish in-flight exchange → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - The only fatal error is an empty local backend host
//! - Every long-running loop observes the same shutdown signal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::StartupError;
