//! # Retry Policy
//!
//! Bounded exponential backoff for orchestrator-facing calls. The policy is
//! immutable configuration: delay math is a pure function of the attempt
//! number, so one policy can be shared read-only across invocations.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use taskkit::RetryPolicy;
//!
//! let policy = RetryPolicy::new(Duration::from_millis(100))
//!     .with_multiplier(2.0)
//!     .with_max_attempts(5)
//!     .with_jitter(false);
//!
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
//! assert!(policy.should_retry(5));
//! assert!(!policy.should_retry(6));
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for transient failures
///
/// Delays grow exponentially from `initial_delay` by `multiplier`, capped at
/// `max_delay`. When `jitter` is enabled a random offset in `[0, delay]` is
/// added to spread concurrently failing tasks apart, and the jittered value
/// is clamped back to `max_delay`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,

    /// Growth factor applied per attempt (2.0 doubles each time)
    pub multiplier: f64,

    /// Ceiling for any single delay
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Whether to add random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given initial delay and default shape
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..Default::default()
        }
    }

    /// Create a policy that allows a single attempt and never waits
    pub fn no_retry() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            max_attempts: 1,
            jitter: false,
        }
    }

    /// Create a policy with a fixed delay between attempts (no growth)
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts,
            jitter: false,
        }
    }

    /// Set the growth factor (clamped to at least 1.0)
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Set the delay ceiling
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the attempt ceiling (including the first attempt)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after a failure of the given attempt (1-based)
    ///
    /// Computes `min(max_delay, initial_delay * multiplier^(attempt - 1))`,
    /// plus jitter in `[0, delay]` when enabled. Never exceeds `max_delay`.
    /// Saturates instead of overflowing for absurd attempt numbers.
    pub fn delay_for_attempt(&self, attempt_number: u32) -> Duration {
        if attempt_number == 0 {
            return Duration::ZERO;
        }

        let max = self.max_delay.as_secs_f64();
        let exponent = attempt_number.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(max);

        let delay = if self.jitter && capped > 0.0 {
            let mut rng = rand::thread_rng();
            (capped + rng.gen_range(0.0..=capped)).min(max)
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }

    /// Whether the given attempt (1-based) is still within the ceiling
    pub fn should_retry(&self, attempt_number: u32) -> bool {
        attempt_number <= self.max_attempts
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
