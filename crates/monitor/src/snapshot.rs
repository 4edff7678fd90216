//! Owner of the authoritative job snapshot.
//!
//! Pulls are tagged with a sequence number when issued. Responses can
//! resolve out of order, so a response older than the one last applied is
//! discarded, and a terminal snapshot is never replaced by a non-terminal
//! one.

use std::sync::Arc;

use chrono::Utc;
use jobsync_core::job::Job;
use jobsync_core::status::JobStatus;
use jobsync_core::types::Timestamp;
use serde::Serialize;

/// Whether the host is looking at current data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    /// No pull has succeeded yet.
    Unloaded,
    /// The last pull succeeded.
    Fresh,
    /// A snapshot exists but the most recent pull failed.
    Stale { last_error: String },
}

/// Result of offering a pull response to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot was replaced.
    Replaced { previous: Option<JobStatus> },
    /// The response equals the current snapshot.
    Unchanged,
    /// An older pull resolved after a newer one was applied.
    OutOfOrder,
    /// The response would move a terminal job back to a live status.
    Regression,
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    job: Option<Arc<Job>>,
    issued_seq: u64,
    applied_seq: u64,
    last_error: Option<String>,
    updated_at: Option<Timestamp>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the sequence number for a pull about to be issued.
    pub fn next_seq(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    pub fn job(&self) -> Option<&Arc<Job>> {
        self.job.as_ref()
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(|job| job.status)
    }

    pub fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn freshness(&self) -> Freshness {
        match (&self.job, &self.last_error) {
            (None, _) => Freshness::Unloaded,
            (Some(_), None) => Freshness::Fresh,
            (Some(_), Some(err)) => Freshness::Stale {
                last_error: err.clone(),
            },
        }
    }

    /// Offer the response of pull `seq`.
    pub fn apply(&mut self, seq: u64, job: Job) -> ApplyOutcome {
        if seq < self.applied_seq {
            return ApplyOutcome::OutOfOrder;
        }

        let previous = self.status();
        if previous.is_some_and(JobStatus::is_terminal) && !job.status.is_terminal() {
            return ApplyOutcome::Regression;
        }

        self.applied_seq = seq;
        self.last_error = None;

        if self.job.as_deref() == Some(&job) {
            return ApplyOutcome::Unchanged;
        }

        self.job = Some(Arc::new(job));
        self.updated_at = Some(Utc::now());
        ApplyOutcome::Replaced { previous }
    }

    /// Record a failed pull. The current snapshot, if any, is kept.
    ///
    /// Returns `false` when a newer pull has already been applied, in
    /// which case the failure says nothing about the data on hand.
    pub fn record_failure(&mut self, seq: u64, error: impl Into<String>) -> bool {
        if seq < self.applied_seq {
            return false;
        }
        self.last_error = Some(error.into());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn job(status: JobStatus) -> Job {
        Job {
            id: "42".to_string(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn starts_unloaded() {
        let mut store = SnapshotStore::new();
        assert_eq!(store.freshness(), Freshness::Unloaded);

        let seq = store.next_seq();
        assert!(store.record_failure(seq, "connection refused"));
        // Failures before the first load do not pretend data exists.
        assert_eq!(store.freshness(), Freshness::Unloaded);
        assert_eq!(store.last_error(), Some("connection refused"));
    }

    #[test]
    fn failure_after_load_is_stale_and_keeps_snapshot() {
        let mut store = SnapshotStore::new();
        let seq = store.next_seq();
        store.apply(seq, job(JobStatus::Running));

        let seq = store.next_seq();
        store.record_failure(seq, "timeout");
        assert_eq!(
            store.freshness(),
            Freshness::Stale {
                last_error: "timeout".into()
            }
        );
        assert_eq!(store.status(), Some(JobStatus::Running));

        let seq = store.next_seq();
        store.apply(seq, job(JobStatus::Running));
        assert_eq!(store.freshness(), Freshness::Fresh);
    }

    #[test]
    fn identical_replay_is_unchanged() {
        let mut store = SnapshotStore::new();
        let seq = store.next_seq();
        assert_matches!(
            store.apply(seq, job(JobStatus::Running)),
            ApplyOutcome::Replaced { previous: None }
        );
        let first = Arc::clone(store.job().unwrap());
        let stamped = store.updated_at();

        assert_eq!(store.apply(seq, job(JobStatus::Running)), ApplyOutcome::Unchanged);
        assert!(Arc::ptr_eq(&first, store.job().unwrap()));
        assert_eq!(store.updated_at(), stamped);
    }

    #[test]
    fn older_response_is_discarded() {
        let mut store = SnapshotStore::new();
        let early = store.next_seq();
        let late = store.next_seq();

        store.apply(late, job(JobStatus::Running));
        assert_eq!(store.apply(early, job(JobStatus::Pending)), ApplyOutcome::OutOfOrder);
        assert_eq!(store.status(), Some(JobStatus::Running));
        assert!(!store.record_failure(early, "late failure"));
        assert_eq!(store.freshness(), Freshness::Fresh);
    }

    #[test]
    fn terminal_snapshot_never_regresses() {
        let mut store = SnapshotStore::new();
        let seq = store.next_seq();
        store.apply(seq, job(JobStatus::Completed));

        let seq = store.next_seq();
        assert_eq!(store.apply(seq, job(JobStatus::Running)), ApplyOutcome::Regression);
        assert_eq!(store.status(), Some(JobStatus::Completed));
    }

    #[test]
    fn replacement_reports_previous_status() {
        let mut store = SnapshotStore::new();
        let seq = store.next_seq();
        store.apply(seq, job(JobStatus::Running));

        let seq = store.next_seq();
        assert_matches!(
            store.apply(seq, job(JobStatus::Completed)),
            ApplyOutcome::Replaced {
                previous: Some(JobStatus::Running)
            }
        );
    }
}
