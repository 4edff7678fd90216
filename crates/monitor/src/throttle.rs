//! Trailing-edge refresh throttling.
//!
//! Bursty push events each ask for a refresh; the throttler folds a burst
//! into at most one pull per window while guaranteeing that the last
//! request in a burst is always followed by a pull. It makes decisions
//! only; the actor owns the deferred timer and performs the pulls.

use std::time::Duration;

use tokio::time::Instant;

/// Default minimum spacing between throttled pulls.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(2000);

/// What the caller must do in response to a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Pull immediately (and cancel the deferred timer if armed).
    PullNow,
    /// Arm the deferred timer to fire after the given delay.
    Schedule(Duration),
    /// A deferred pull is already pending; it will cover this request.
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct RefreshThrottler {
    window: Duration,
    last_pull_at: Option<Instant>,
    deferred_pending: bool,
}

impl RefreshThrottler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_pull_at: None,
            deferred_pending: false,
        }
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred_pending
    }

    /// Decide how to serve one refresh request made at `now`.
    pub fn request(&mut self, immediate: bool, now: Instant) -> ThrottleDecision {
        if immediate {
            self.deferred_pending = false;
            return ThrottleDecision::PullNow;
        }

        let elapsed = match self.last_pull_at {
            Some(at) => now.saturating_duration_since(at),
            None => return ThrottleDecision::PullNow,
        };

        if elapsed >= self.window {
            self.deferred_pending = false;
            ThrottleDecision::PullNow
        } else if self.deferred_pending {
            ThrottleDecision::Coalesced
        } else {
            self.deferred_pending = true;
            ThrottleDecision::Schedule(self.window - elapsed)
        }
    }

    /// Record that a pull was issued at `now`, from any source.
    ///
    /// A pull issued after a deferred request already covers it, so the
    /// pending deferral is dropped as well.
    pub fn mark_pulled(&mut self, now: Instant) -> bool {
        self.last_pull_at = Some(now);
        std::mem::take(&mut self.deferred_pending)
    }
}

impl Default for RefreshThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_WINDOW)
    }
}
