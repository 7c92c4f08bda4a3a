//! Reconnection Policy
//!
//! Fixed-interval retry for the streaming connection. Every failed read
//! or failed reopen waits the same interval before the next attempt, and
//! attempts never run out; the connector only stops when it is closed.

use std::time::Duration;

/// Default wait between reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before every reconnection attempt.
    pub retry_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl ReconnectConfig {
    /// Create a configuration with a custom interval.
    #[must_use]
    pub const fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }
}

/// Tracks reconnection attempts since the last successful open.
///
/// # Example
///
/// ```rust
/// use sitestream_client::infrastructure::stream::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::new(Duration::from_secs(5)));
///
/// assert_eq!(policy.next_delay(), Duration::from_secs(5));
/// assert_eq!(policy.next_delay(), Duration::from_secs(5));
/// assert_eq!(policy.attempt_count(), 2);
///
/// // Simulate successful connection
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Register an attempt and return how long to wait before it.
    pub const fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.config.retry_interval
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval() {
        assert_eq!(
            ReconnectConfig::default().retry_interval,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn delay_never_grows() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::new(Duration::from_millis(250)));
        for attempt in 1..=100 {
            assert_eq!(policy.next_delay(), Duration::from_millis(250));
            assert_eq!(policy.attempt_count(), attempt);
        }
    }

    #[test]
    fn reset_clears_attempts() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), DEFAULT_RETRY_INTERVAL);
        assert_eq!(policy.attempt_count(), 1);
    }

    #[test]
    fn attempt_count_saturates() {
        let mut policy = ReconnectPolicy {
            config: ReconnectConfig::default(),
            attempt_count: u32::MAX,
        };
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), u32::MAX);
    }
}
