//! Reconnect delay policy for the real-time connection.
//!
//! The delay starts at `initial_delay`, grows by `multiplier` on each failed
//! attempt and is capped at `max_delay`. A randomization factor spreads
//! reconnects of many clients after a server restart.
//!
//! ## Example
//!
//! ```
//! use alertdesk_core::backoff::ReconnectPolicy;
//! use std::time::Duration;
//!
//! let policy = ReconnectPolicy {
//!     randomization_factor: 0.0,
//!     ..ReconnectPolicy::default()
//! };
//! assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
//! assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnect behavior with capped exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (caps exponential growth).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles each time).
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay (0.0 disables jitter).
    pub randomization_factor: f64,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            randomization_factor: 0.5,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Policy without jitter, for deterministic timing.
    pub fn fixed(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            randomization_factor: 0.0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given (zero-based) attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt.min(32) as i32);
        let max_delay = self.max_delay.as_secs_f64();
        // Never hand a negative or non-finite value to `Duration`.
        let capped_delay = if base_delay.is_finite() {
            base_delay.clamp(0.0, max_delay)
        } else {
            max_delay
        };

        if self.randomization_factor <= 0.0 || capped_delay <= 0.0 {
            return Duration::from_secs_f64(capped_delay);
        }

        let jitter_range = capped_delay * self.randomization_factor.min(1.0);
        let jitter = rand::rng().random_range(-jitter_range..jitter_range);
        let final_delay = (capped_delay + jitter)
            .max(0.0)
            .min(max_delay);

        Duration::from_secs_f64(final_delay)
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}
