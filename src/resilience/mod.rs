//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dial to broker fails:
//!     → backoff.rs (fixed delay, optional jitter)
//!     → pool loop sleeps, then dials again (no attempt limit)
//!
//! Call to local backend fails:
//!     → answered with a synthesized 502, session continues
//! ```
//!
//! # Design Decisions
//! - Failures are absorbed where they happen; nothing crashes the process
//! - Retry delay does not grow; jitter avoids synchronized retry storms

pub mod backoff;
