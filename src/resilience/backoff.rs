//! Fixed retry delay with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Delay applied after a failed dial.
///
/// The base delay never grows; jitter spreads clients that failed together.
#[derive(Debug, Clone, Copy)]
pub struct RetryDelay {
    base: Duration,
    jitter: f64,
}

impl RetryDelay {
    /// `jitter` is the fraction of `base` that may be added at random, clamped to [0, 1].
    pub fn new(base: Duration, jitter: f64) -> Self {
        let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
        Self { base, jitter }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// The next delay to wait.
    pub fn next_delay(&self) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let jitter_range = (base_ms as f64 * self.jitter) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };

        Duration::from_millis(base_ms + jitter)
    }
}
