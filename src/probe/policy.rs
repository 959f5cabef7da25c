use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::ProbeConfig;

/// Retry policy for the probe loop
///
/// The interval is fixed between attempts. `max_attempts` is opt-in; the
/// default keeps trying until the replica set answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between a failed attempt and the next one
    pub interval: Duration,
    /// Upper bound for a single attempt, shorter than `interval`
    pub attempt_timeout: Duration,
    /// Stop after this many attempts
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for RetryPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.check_interval_ms),
            attempt_timeout: Duration::from_millis(config.check_timeout_ms),
            max_attempts: config.max_attempts.and_then(NonZeroU32::new),
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = NonZeroU32::new(max_attempts);
        self
    }

    /// Whether another attempt may follow `attempts` failed ones
    pub fn allows_retry(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max.get(),
            None => true,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some()
    }
}
