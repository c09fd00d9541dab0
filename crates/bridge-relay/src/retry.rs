//! Send retry policy
//!
//! Pure backoff computation, no I/O. TX overflow on CAN hardware is normally
//! transient (bus saturation clears within tens to hundreds of
//! milliseconds), so retries back off exponentially but stay capped: an
//! unbounded backoff would stall relay of unrelated frames behind one
//! congested send.

use std::time::Duration;

use crate::config::EngineConfig;

/// Upper bound on a single backoff sleep
pub const BACKOFF_CAP: Duration = Duration::from_millis(200);

/// Backoff and retry/cooldown decisions for overflow-classified send failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    cooldown: Duration,
}

impl RetryPolicy {
    /// Extract the retry knobs from an engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_send_retries.max(1),
            initial_delay: config.send_retry_initial_delay,
            cooldown: config.tx_overflow_cooldown,
        }
    }

    /// Total send attempts per frame (at least 1)
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff sleep sequence between attempts: `d, 2d, 4d, ...` capped.
    /// The iterator is unbounded; the attempt budget limits consumption.
    pub fn backoff_delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.initial_delay), |d| {
            Some(d.saturating_mul(2).min(BACKOFF_CAP))
        })
    }

    /// Cooldown slept after dropping a frame on overflow, when configured
    pub fn cooldown(&self) -> Option<Duration> {
        (self.cooldown > Duration::ZERO).then_some(self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: u32, initial_ms: u64, cooldown_ms: u64) -> RetryPolicy {
        let config = EngineConfig {
            max_send_retries: max,
            send_retry_initial_delay: Duration::from_millis(initial_ms),
            tx_overflow_cooldown: Duration::from_millis(cooldown_ms),
            ..EngineConfig::default()
        };
        RetryPolicy::from_config(&config)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let delays: Vec<_> = policy(10, 10, 50).backoff_delays().take(7).collect();
        let ms: Vec<u64> = delays.iter().map(|d| d.as_millis() as u64).collect();
        assert_eq!(ms, vec![10, 20, 40, 80, 160, 200, 200]);
    }

    #[test]
    fn test_attempts_clamped_to_one() {
        assert_eq!(policy(0, 10, 50).max_attempts(), 1);
    }

    #[test]
    fn test_cooldown_only_when_positive() {
        assert_eq!(policy(3, 10, 50).cooldown(), Some(Duration::from_millis(50)));
        assert_eq!(policy(3, 10, 0).cooldown(), None);
    }
}
