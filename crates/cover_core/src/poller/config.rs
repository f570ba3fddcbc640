//! Poll cadence.

use std::time::Duration;

/// Interval growth after each non-terminal response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Factor applied to the interval; `1.0` keeps it fixed.
    pub multiplier: f64,
    /// The interval never grows past this.
    pub max_interval: Duration,
}

impl BackoffPolicy {
    /// No growth.
    pub fn fixed() -> Self {
        Self {
            multiplier: 1.0,
            max_interval: Duration::MAX,
        }
    }

    pub fn exponential(multiplier: f64, max_interval: Duration) -> Self {
        Self {
            multiplier,
            max_interval,
        }
    }

    /// Interval to use after `current`.
    pub fn next(&self, current: Duration) -> Duration {
        if self.multiplier <= 1.0 || !self.multiplier.is_finite() {
            return current;
        }
        let grown = current.as_secs_f64() * self.multiplier;
        if grown >= self.max_interval.as_secs_f64() {
            self.max_interval.max(current)
        } else {
            Duration::from_secs_f64(grown)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed()
    }
}

/// How a job is polled.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the first query and between queries.
    pub interval: Duration,
    pub backoff: BackoffPolicy,
    /// Consecutive transport failures tolerated before giving up.
    /// `None` polls until cancelled.
    pub max_transport_errors: Option<u32>,
}

impl PollConfig {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff: BackoffPolicy::fixed(),
            max_transport_errors: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_transport_errors(mut self, max: u32) -> Self {
        self.max_transport_errors = Some(max);
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(30_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_keeps_interval() {
        let policy = BackoffPolicy::fixed();
        assert_eq!(policy.next(Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn exponential_policy_grows_and_caps() {
        let policy = BackoffPolicy::exponential(2.0, Duration::from_secs(50));
        let second = policy.next(Duration::from_secs(10));
        assert_eq!(second, Duration::from_secs(20));
        let third = policy.next(second);
        assert_eq!(third, Duration::from_secs(40));
        assert_eq!(policy.next(third), Duration::from_secs(50));
        assert_eq!(policy.next(Duration::from_secs(50)), Duration::from_secs(50));
    }

    #[test]
    fn default_config_is_thirty_seconds() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.max_transport_errors, None);
    }
}
