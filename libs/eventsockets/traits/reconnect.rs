use crate::traits::error::{Result, SocketError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// A strategy is consulted every time a connect attempt fails. The
/// retry budget is expressed through `should_reconnect`: once it
/// returns `false` the connection gives up and reports the last error.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next connect attempt
    ///
    /// # Arguments
    /// * `retry` - Number of retries already performed in this cycle (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long, then try again
    /// * `None` - Retry budget exhausted
    fn next_delay(&self, retry: usize) -> Option<Duration>;

    /// Reset the strategy state (called when a new connect cycle begins)
    fn reset(&mut self);

    /// Check whether another retry is allowed
    fn should_reconnect(&self, retry: usize) -> bool;
}

/// Exponential backoff with a ceiling and an optional retry limit
///
/// Retry `n` (0-indexed) waits `initial_delay * factor^n`, capped at
/// `max_delay`. With jitter enabled the delay is multiplied by a random
/// value in `[1, 2)` before the cap is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    max_retries: Option<usize>,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy with factor 2 and no jitter
    ///
    /// # Arguments
    /// * `initial_delay` - Delay before the first retry
    /// * `max_delay` - Ceiling for any single delay
    /// * `max_retries` - Retry budget per cycle (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            factor: 2.0,
            max_retries,
            jitter: false,
        }
    }

    /// Set the growth factor (values below 1 are clamped to 1)
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// Enable or disable randomized delays
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay for a retry before the cap and budget are applied
    fn raw_delay_ms(&self, retry: usize) -> f64 {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let mut delay = self.initial_delay.as_millis() as f64 * self.factor.powi(exponent);
        if self.jitter {
            delay *= rand::thread_rng().gen_range(1.0..2.0);
        }
        delay
    }
}

impl Default for ExponentialBackoff {
    /// 1s base delay, factor 2, capped at 60s, unlimited retries
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), None)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, retry: usize) -> Option<Duration> {
        if !self.should_reconnect(retry) {
            return None;
        }

        let cap = self.max_delay.as_millis() as f64;
        let delay = self.raw_delay_ms(retry);
        let delay = if delay.is_finite() { delay.min(cap) } else { cap };
        Some(Duration::from_millis(delay as u64))
    }

    fn reset(&mut self) {
        // Stateless: the retry counter lives in the connect driver
    }

    fn should_reconnect(&self, retry: usize) -> bool {
        self.max_retries.map_or(true, |max| retry < max)
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between attempts
#[derive(Debug, Clone, PartialEq)]
pub struct FixedDelay {
    delay: Duration,
    max_retries: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_retries: Option<usize>) -> Self {
        Self { delay, max_retries }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, retry: usize) -> Option<Duration> {
        self.should_reconnect(retry).then_some(self.delay)
    }

    fn reset(&mut self) {}

    fn should_reconnect(&self, retry: usize) -> bool {
        self.max_retries.map_or(true, |max| retry < max)
    }
}

/// Serializable retry policy, used by configuration files
///
/// Converted into an [`ExponentialBackoff`] with [`RetrySettings::to_strategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retry budget per connect cycle (None = unlimited)
    pub max_retries: Option<usize>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            factor: 2.0,
            jitter: false,
        }
    }
}

impl RetrySettings {
    /// Check the settings describe a usable backoff
    pub fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(SocketError::Configuration(format!(
                "backoff factor must be >= 1, got {}",
                self.factor
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(SocketError::Configuration(format!(
                "max_delay_ms ({}) is lower than initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }

    /// Build a fresh strategy from these settings
    pub fn to_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.max_retries,
        )
        .with_factor(self.factor)
        .with_jitter(self.jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays_grow_and_cap() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(1_000), None);

        let delays: Vec<u128> = (0..6)
            .map(|retry| strategy.next_delay(retry).unwrap().as_millis())
            .collect();

        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn test_exponential_budget_is_respected() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(1), Some(2));

        assert!(strategy.next_delay(0).is_some());
        assert!(strategy.next_delay(1).is_some());
        assert!(strategy.next_delay(2).is_none());
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(1), Some(0));
        assert!(!strategy.should_reconnect(0));
        assert_eq!(strategy.next_delay(0), None);
    }

    #[test]
    fn test_custom_factor() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(60), None)
            .with_factor(3.0);
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(900)));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(60), None)
            .with_jitter(true);

        for _ in 0..50 {
            let delay = strategy.next_delay(1).unwrap();
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(400));
        }
    }

    #[test]
    fn test_huge_retry_numbers_hit_the_cap() {
        let strategy = ExponentialBackoff::default();
        assert_eq!(strategy.next_delay(10_000), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_fixed_delay() {
        let strategy = FixedDelay::new(Duration::from_millis(750), Some(3));
        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(750)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(750)));
        assert_eq!(strategy.next_delay(3), None);
    }

    #[test]
    fn test_settings_validation() {
        assert!(RetrySettings::default().validate().is_ok());

        let bad_factor = RetrySettings { factor: 0.5, ..Default::default() };
        assert!(bad_factor.validate().is_err());

        let inverted = RetrySettings {
            initial_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_settings_into_strategy() {
        let settings = RetrySettings {
            max_retries: Some(4),
            initial_delay_ms: 50,
            max_delay_ms: 120,
            factor: 2.0,
            jitter: false,
        };
        let strategy = settings.to_strategy();

        assert_eq!(strategy.max_retries(), Some(4));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(120)));
    }
}
