//! Named timer slots owned by the monitor actor.
//!
//! Each slot holds at most one pending timer; arming a slot replaces
//! whatever it held before. An idle slot's wait future never resolves, so
//! the slots can sit in a `select!` loop unconditionally.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// A one-shot deadline (throttle window, reconnect backoff).
#[derive(Debug)]
pub struct DeadlineTimer {
    name: &'static str,
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            deadline: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arm the slot, replacing any pending deadline.
    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn arm_after(&mut self, delay: Duration) {
        self.arm(Instant::now() + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Resolves when the armed deadline passes. The caller must
    /// [`cancel`](Self::cancel) the slot once it fires.
    pub async fn fired(&self) {
        match self.deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => future::pending().await,
        }
    }
}

/// A repeating interval (fallback poll).
#[derive(Debug)]
pub struct PollTimer {
    name: &'static str,
    interval: Option<Interval>,
}

impl PollTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            interval: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Start ticking every `period`, first tick one period from now.
    /// Replaces a running interval.
    pub fn start(&mut self, period: Duration) {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => future::pending().await,
        }
    }
}
