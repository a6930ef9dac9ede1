use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Linear backoff schedule: each consecutive failure adds `increment` to the
/// delay, bounded below by `min_delay` and above by `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    min_delay_ms: u64,
    increment_ms: u64,
    max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            increment_ms: 200,
            max_delay_ms: 1600,
        }
    }
}

impl BackoffConfig {
    #[must_use]
    pub fn new(min_delay: Duration, increment: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay_ms: duration_ms(min_delay),
            increment_ms: duration_ms(increment),
            max_delay_ms: duration_ms(max_delay),
        }
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    #[must_use]
    pub fn increment(&self) -> Duration {
        Duration::from_millis(self.increment_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    #[must_use]
    pub fn start(&self) -> Backoff {
        Backoff::new(*self)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Running failure counter for one retry loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay to wait before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        let grown = self.config.increment().saturating_mul(self.failures);
        grown
            .max(self.config.min_delay())
            .min(self.config.max_delay().max(self.config.min_delay()))
    }

    /// Count a failed attempt and return the delay before the next one.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay()
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> BackoffConfig {
        BackoffConfig::new(
            Duration::ZERO,
            Duration::from_millis(200),
            Duration::from_millis(1600),
        )
    }

    #[test]
    fn fresh_backoff_uses_minimum_delay() {
        assert_eq!(schedule().start().delay(), Duration::ZERO);
    }

    #[test]
    fn delay_after_n_failures_is_n_increments() {
        let mut backoff = schedule().start();

        for n in 1..=8_u32 {
            let delay = backoff.record_failure();
            assert_eq!(delay, Duration::from_millis(200) * n);
        }
    }

    #[test]
    fn delay_is_capped() {
        let mut backoff = schedule().start();

        for _ in 0..50 {
            backoff.record_failure();
        }

        assert_eq!(backoff.failures(), 50);
        assert_eq!(backoff.delay(), Duration::from_millis(1600));
    }

    #[test]
    fn reset_returns_to_minimum() {
        let config = BackoffConfig::new(
            Duration::from_millis(50),
            Duration::from_millis(100),
            Duration::from_millis(300),
        );
        let mut backoff = config.start();
        backoff.record_failure();
        backoff.record_failure();

        backoff.reset();

        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.delay(), Duration::from_millis(50));
    }

    #[test]
    fn minimum_applies_when_increment_is_small() {
        let config = BackoffConfig::new(
            Duration::from_millis(500),
            Duration::from_millis(100),
            Duration::from_millis(1000),
        );
        let mut backoff = config.start();

        assert_eq!(backoff.record_failure(), Duration::from_millis(500));
    }
}
