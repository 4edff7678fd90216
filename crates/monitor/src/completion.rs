use std::collections::BTreeMap;

use jobsync_core::events::{EventPayload, StreamEventKind};
use jobsync_core::job::{Job, Resource};
use jobsync_core::progress::Progress;
use jobsync_core::status::JobStatus;
use jobsync_core::types::JobId;
use serde::Serialize;

/// Normalized result handed to the completion callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCompletion {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_resources: Option<BTreeMap<String, Vec<Resource>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl JobCompletion {
    /// Build the completion for a terminal event.
    ///
    /// Returns `None` for non-terminal kinds. Fields the payload leaves out
    /// are taken from `snapshot` when one is loaded.
    pub fn from_event(
        job_id: &str,
        kind: StreamEventKind,
        payload: &EventPayload,
        snapshot: Option<&Job>,
    ) -> Option<Self> {
        let fallback = kind.terminal_status()?;
        let status = payload
            .status
            .filter(|status| status.is_terminal())
            .unwrap_or(fallback);

        let progress = payload
            .progress
            .clone()
            .or_else(|| snapshot.map(|job| job.progress.clone()))
            .unwrap_or_default();

        let summary = payload.summary.clone().or_else(|| {
            snapshot
                .filter(|job| !job.summary.is_empty())
                .map(|job| job.summary.clone())
        });

        let created_resources = payload.created_resources.clone().or_else(|| {
            snapshot
                .filter(|job| job.has_created_resources())
                .map(|job| job.created_resources.clone())
        });

        let errors = Some(payload.all_errors())
            .filter(|errors| !errors.is_empty())
            .or_else(|| {
                snapshot
                    .filter(|job| !job.errors.is_empty())
                    .map(|job| job.errors.clone())
            });

        Some(Self {
            job_id: payload.job_id.clone().unwrap_or_else(|| job_id.to_string()),
            status,
            progress,
            summary,
            created_resources,
            errors,
        })
    }

    /// `true` when the job ended badly but left resources behind that the
    /// host may want to clean up.
    pub fn needs_cleanup(&self) -> bool {
        matches!(self.status, JobStatus::Failed | JobStatus::Partial)
            && self
                .created_resources
                .as_ref()
                .is_some_and(|resources| resources.values().any(|list| !list.is_empty()))
    }
}
