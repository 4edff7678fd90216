//! Exponential-backoff schedule for re-opening the event stream.
//!
//! The connection machine counts failed attempts since the last successful
//! open and asks the policy how long to wait before the next one.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Wait before the first retry after a drop.
    pub initial_delay: Duration,
    /// Ceiling for any single wait.
    pub max_delay: Duration,
    /// Growth factor applied per consecutive failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// `initial_delay * multiplier^failures`, clamped to `max_delay`.
    fn delay_for(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// How the stream is re-opened after a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Only an explicit reconnect request re-opens the stream.
    Manual,
    /// Re-open automatically on an exponential-backoff schedule.
    Backoff(ReconnectConfig),
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Backoff(ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    /// Wait before the next automatic attempt, given how many attempts
    /// have failed since the stream was last open. `None` under
    /// [`ReconnectPolicy::Manual`].
    pub fn retry_after(&self, failures: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Manual => None,
            ReconnectPolicy::Backoff(config) => Some(config.delay_for(failures)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(policy: &ReconnectPolicy, attempts: u32) -> Vec<u64> {
        (0..attempts)
            .filter_map(|n| policy.retry_after(n))
            .map(|delay| delay.as_millis() as u64)
            .collect()
    }

    #[test]
    fn default_schedule_doubles_up_to_thirty_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            schedule(&policy, 8),
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn manual_policy_never_schedules() {
        assert!(schedule(&ReconnectPolicy::Manual, 5).is_empty());
    }

    #[test]
    fn sub_second_start_with_low_ceiling() {
        let policy = ReconnectPolicy::Backoff(ReconnectConfig {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(1_500),
            multiplier: 3.0,
        });
        assert_eq!(schedule(&policy, 4), vec![250, 750, 1_500, 1_500]);
    }

    #[test]
    fn huge_failure_counts_stay_at_the_ceiling() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.retry_after(u32::MAX), Some(Duration::from_secs(30)));
        assert_eq!(policy.retry_after(5_000), Some(Duration::from_secs(30)));
    }
}
