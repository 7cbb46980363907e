//! Retry delays for discovery and supervision cycles.
//!
//! Both the discovery resolver and the supervision loop back off
//! exponentially between attempts:
//!
//! ```text
//! attempt 1 -> base
//! attempt 2 -> base * 2
//! attempt n -> min(base * 2^(n-1), max)
//! ```
//!
//! ```
//! use natsvisor::reliability::Backoff;
//! use std::time::Duration;
//!
//! let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(8));
//! assert_eq!(backoff.delay(1), Duration::from_millis(500));
//! assert_eq!(backoff.delay(3), Duration::from_secs(2));
//! assert_eq!(backoff.delay(10), Duration::from_secs(8));
//! ```

use std::time::Duration;

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Backoff starting at `base` and never exceeding `max`.
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Backoff from millisecond settings.
    pub const fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base.checked_mul(factor).map_or(self.max, |d| d.min(self.max))
    }

    /// Base delay.
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Delay ceiling.
    pub const fn max(&self) -> Duration {
        self.max
    }
}
