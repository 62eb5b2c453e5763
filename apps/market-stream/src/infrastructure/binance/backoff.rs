//! Reconnection Backoff
//!
//! Exponential backoff with symmetric jitter for stream reconnects:
//! `min(base * 2^attempt, max)`, widened by up to ±`jitter_factor` of that
//! value.
//!
//! The policy holds no attempt counter; the connection manager owns the
//! counter and passes it in, so the delay for a given attempt can be
//! computed and tested in isolation.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnect delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay for attempt 0 before jitter.
    pub base_delay: Duration,
    /// Cap on the exponential term.
    pub max_delay: Duration,
    /// Jitter factor as a fraction (e.g., 0.2 = ±20% randomization).
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

impl BackoffConfig {
    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub const fn from_stream_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            base_delay: settings.reconnect_delay_base,
            max_delay: settings.reconnect_delay_max,
            jitter_factor: settings.reconnect_jitter,
        }
    }
}

/// Maps a reconnect attempt number to a delay.
///
/// # Example
///
/// ```rust
/// use market_stream::infrastructure::binance::backoff::{BackoffConfig, BackoffPolicy};
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::new(BackoffConfig::default());
///
/// // Without jitter the schedule is 1s, 2s, 4s, ... capped at 30s
/// assert_eq!(policy.delay_with_jitter(0, 0.0), Duration::from_secs(1));
/// assert_eq!(policy.delay_with_jitter(10, 0.0), Duration::from_secs(30));
///
/// let jittered = policy.delay(0);
/// assert!(jittered >= Duration::from_millis(800));
/// assert!(jittered <= Duration::from_millis(1200));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BackoffPolicy {
    config: BackoffConfig,
}

impl BackoffPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Get the policy configuration.
    #[must_use]
    pub const fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Capped exponential term for `attempt`, before jitter.
    #[must_use]
    pub fn expected_delay(&self, attempt: u32) -> Duration {
        let base_millis = duration_millis(self.config.base_delay);
        let max_millis = duration_millis(self.config.max_delay);
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = (base_millis * 2f64.powi(exponent)).min(max_millis);
        millis_to_duration(millis)
    }

    /// Delay for `attempt` with a random jitter sample.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let unit: f64 = rand::rng().random_range(-1.0..=1.0);
        self.delay_with_jitter(attempt, unit)
    }

    /// Delay for `attempt` with an explicit jitter sample in `[-1.0, 1.0]`.
    ///
    /// `-1.0` yields the lower bound, `1.0` the upper bound and `0.0` the
    /// exact exponential term. Samples outside the range are clamped.
    #[must_use]
    pub fn delay_with_jitter(&self, attempt: u32, unit: f64) -> Duration {
        let expected = duration_millis(self.expected_delay(attempt));
        let unit = if unit.is_finite() { unit.clamp(-1.0, 1.0) } else { 0.0 };
        let jitter = expected * self.config.jitter_factor.max(0.0) * unit;
        millis_to_duration(expected + jitter)
    }
}

#[allow(clippy::cast_precision_loss)]
fn duration_millis(duration: Duration) -> f64 {
    duration.as_millis() as f64
}

fn millis_to_duration(millis: f64) -> Duration {
    if millis.is_finite() && millis > 0.0 {
        Duration::from_secs_f64(millis / 1000.0)
    } else {
        Duration::ZERO
    }
}
