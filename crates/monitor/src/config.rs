use std::time::Duration;

use jobsync_core::event_log::DEFAULT_LOG_CAPACITY;

use crate::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::throttle::DEFAULT_THROTTLE_WINDOW;

/// Default interval between fallback polls while the stream is down.
pub const DEFAULT_FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timing and retention settings for one job monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Minimum spacing between throttled pulls.
    pub throttle_window: Duration,
    /// Interval of unthrottled pulls while disconnected.
    pub fallback_poll_interval: Duration,
    /// How the stream is re-opened after a transport error.
    pub reconnect: ReconnectPolicy,
    /// Number of live-log lines kept.
    pub log_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            fallback_poll_interval: DEFAULT_FALLBACK_POLL_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                            | Default   |
    /// |------------------------------------|-----------|
    /// | `JOBSYNC_THROTTLE_WINDOW_MS`       | `2000`    |
    /// | `JOBSYNC_FALLBACK_POLL_SECS`       | `10`      |
    /// | `JOBSYNC_RECONNECT`                | `backoff` |
    /// | `JOBSYNC_RECONNECT_MAX_DELAY_SECS` | `30`      |
    ///
    /// `JOBSYNC_RECONNECT=manual` disables automatic reconnection.
    /// Malformed values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let throttle_window = parse_or(&lookup, "JOBSYNC_THROTTLE_WINDOW_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.throttle_window);

        let fallback_poll_interval = parse_or(&lookup, "JOBSYNC_FALLBACK_POLL_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.fallback_poll_interval);

        let reconnect = match lookup("JOBSYNC_RECONNECT").as_deref() {
            Some("manual") => ReconnectPolicy::Manual,
            other => {
                if let Some(value) = other.filter(|v| *v != "backoff") {
                    tracing::warn!(
                        key = "JOBSYNC_RECONNECT",
                        value,
                        "Unrecognized reconnect policy, using backoff"
                    );
                }
                let mut config = ReconnectConfig::default();
                if let Some(secs) = parse_or(&lookup, "JOBSYNC_RECONNECT_MAX_DELAY_SECS") {
                    config.max_delay = Duration::from_secs(secs).max(config.initial_delay);
                }
                ReconnectPolicy::Backoff(config)
            }
        };

        Self {
            throttle_window,
            fallback_poll_interval,
            reconnect,
            log_capacity: defaults.log_capacity,
        }
    }
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Malformed setting, using default");
            None
        }
    }
}
