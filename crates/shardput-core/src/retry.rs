//! Retry with exponential backoff.
//!
//! The batcher waits `delay_for_attempt(n)` before retry `n + 1`. Delays grow
//! by `backoff_factor` up to `max_delay`, with symmetric jitter so producers
//! throttled at the same moment do not retry in lockstep.
//!
//! Chosen defaults: 5 attempts in total, 100ms first delay, doubling, capped
//! at 5s, ±20% jitter. A policy with a non-zero first delay must grow fast
//! enough that, below the cap, the shortest jittered delay for attempt `n + 1`
//! is longer than the longest one for attempt `n`. Jitter never pushes a delay
//! past `max_delay`.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Upper bound accepted for `jitter_percent`.
pub const MAX_JITTER_PERCENT: f64 = 0.3;

/// Headroom `RetryPolicy::new` adds above [`min_backoff_factor`] when it
/// has to raise a too-small factor.
const BACKOFF_FACTOR_MARGIN: f64 = 0.1;

/// Smallest factor that keeps jittered delays strictly growing; the factor
/// must be greater than this value.
#[must_use]
pub fn min_backoff_factor(jitter_percent: f64) -> f64 {
    (1.0 + jitter_percent) / (1.0 - jitter_percent)
}

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Initial delay before first retry (default: 100ms).
    pub initial_delay: Duration,
    /// Maximum delay between retries (default: 5s).
    pub max_delay: Duration,
    /// Multiplier applied to delay after each retry (default: 2.0).
    pub backoff_factor: f64,
    /// Random jitter range as percentage (default: 0.2 = ±20%).
    pub jitter_percent: f64,
    /// Total submission attempts per `put`, including the first (default: 5).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter_percent: 0.2,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the specified parameters.
    #[must_use]
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        jitter_percent: f64,
        max_attempts: u32,
    ) -> Self {
        let jitter_percent = jitter_percent.clamp(0.0, MAX_JITTER_PERCENT);
        let floor = min_backoff_factor(jitter_percent);
        let backoff_factor = if backoff_factor > floor {
            backoff_factor
        } else {
            floor + BACKOFF_FACTOR_MARGIN
        };
        Self {
            initial_delay,
            max_delay,
            backoff_factor,
            jitter_percent,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Retry without waiting. Useful for tests and callers that pace themselves.
    #[must_use]
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter_percent: 0.0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Reject policies that cannot make bounded progress.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Configuration("retry max_attempts must be >= 1".to_string()));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::Configuration(format!(
                "retry initial_delay {:?} exceeds max_delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::Configuration(format!(
                "retry backoff_factor must be finite and >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if !(0.0..=MAX_JITTER_PERCENT).contains(&self.jitter_percent) {
            return Err(Error::Configuration(format!(
                "retry jitter_percent must be within [0, {MAX_JITTER_PERCENT}], got {}",
                self.jitter_percent
            )));
        }
        // Zero-delay policies retry immediately and have nothing to grow.
        let floor = min_backoff_factor(self.jitter_percent);
        if !self.initial_delay.is_zero() && self.backoff_factor <= floor {
            return Err(Error::Configuration(format!(
                "retry backoff_factor {} must exceed {floor:.3} for jitter {} so delays grow",
                self.backoff_factor, self.jitter_percent
            )));
        }
        Ok(())
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // attempt is capped at 31, safe for i32
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Clamp to sane values - delays beyond u64::MAX ms are not practical
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        // Cap exponent to prevent overflow in powi
        let exp = attempt.min(31) as i32;
        let base_ms = (initial_ms as f64) * self.backoff_factor.powi(exp);
        let base_ms = base_ms.min(max_ms as f64);

        let jitter = if self.jitter_percent > 0.0 && base_ms > 0.0 {
            let mut rng = rand::rng();
            let jitter_range = base_ms * self.jitter_percent;
            rng.random_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        let delay_ms = (base_ms + jitter).clamp(0.0, max_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

/// Wait out a backoff delay unless `cancel` fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled("cancelled before backoff".to_string()));
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled("cancelled during backoff".to_string())),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
