//! Reconnect backoff.

use std::time::Duration;

use crate::config::ReconnectSettings;

/// Linear backoff capped at `max_delay`, with a bounded attempt budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit; attempt `n` waits `n * base_interval`.
    pub base_interval: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Reconnects allowed before giving up for good.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            base_interval: Duration::from_millis(settings.base_interval_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_attempts: settings.max_attempts,
        }
    }

    /// `min(base_interval * attempt, max_delay)`. `attempt` is 1-based.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        std::cmp::min(self.base_interval.saturating_mul(attempt), self.max_delay)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(3_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
        }
    }
}
