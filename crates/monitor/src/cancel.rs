//! Guard against duplicate cancellation requests.

/// Where the cancel request for this job stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancelState {
    #[default]
    Idle,
    /// `POST /cancel` is in flight.
    Requesting,
    /// The server accepted the request; waiting for `job_cancelled`.
    Accepted,
}

#[derive(Debug, Default)]
pub struct CancellationController {
    state: CancelState,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CancelState {
        self.state
    }

    /// `true` from the moment a cancel is requested until it fails or the
    /// job is observed cancelled.
    pub fn in_flight(&self) -> bool {
        self.state != CancelState::Idle
    }

    /// Claim the guard. Returns `false` if a cancel is already in flight.
    pub fn begin(&mut self) -> bool {
        if self.in_flight() {
            return false;
        }
        self.state = CancelState::Requesting;
        true
    }

    pub fn accepted(&mut self) {
        if self.state == CancelState::Requesting {
            self.state = CancelState::Accepted;
        }
    }

    /// Release after a failed request so the user can retry.
    pub fn failed(&mut self) {
        self.state = CancelState::Idle;
    }

    /// Release once the job is known to be finished.
    pub fn release(&mut self) {
        self.state = CancelState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_rejected() {
        let mut guard = CancellationController::new();
        assert!(guard.begin());
        assert!(!guard.begin());
        assert!(guard.in_flight());
    }

    #[test]
    fn accepted_request_holds_guard_until_release() {
        let mut guard = CancellationController::new();
        guard.begin();
        guard.accepted();
        assert_eq!(guard.state(), CancelState::Accepted);
        assert!(!guard.begin());

        guard.release();
        assert!(guard.begin());
    }

    #[test]
    fn failure_allows_retry() {
        let mut guard = CancellationController::new();
        guard.begin();
        guard.failed();
        assert!(!guard.in_flight());
        assert!(guard.begin());
    }

    #[test]
    fn accepted_without_request_is_ignored() {
        let mut guard = CancellationController::new();
        guard.accepted();
        assert_eq!(guard.state(), CancelState::Idle);
    }
}
