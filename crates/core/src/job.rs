//! The job tree returned by `GET /jobs/{id}/status`.
//!
//! A [`Job`] is always decoded from a full status response and replaced
//! wholesale; nothing in the client patches one field by field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::effective::effective_phase_status;
use crate::progress::Progress;
use crate::status::{JobStatus, StepStatus};
use crate::types::{opt_string_or_number, string_or_number, JobId, Timestamp};

/// Full server-side state of one workflow job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "string_or_number")]
    pub id: JobId,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub phases: Vec<Phase>,
    /// Present only for parallel jobs.
    #[serde(default, alias = "childJobs")]
    pub child_jobs: Vec<ChildJob>,
    /// Resources the job created so far, keyed by resource type.
    #[serde(default, alias = "createdResources")]
    pub created_resources: BTreeMap<String, Vec<Resource>>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub summary: BTreeMap<String, serde_json::Value>,
    #[serde(default, alias = "isParallel")]
    pub is_parallel: bool,
}

/// One ordered stage of a sequential job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "startedAt")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "completedAt")]
    pub completed_at: Option<Timestamp>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "durationSeconds"
    )]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<String, serde_json::Value>>,
}

/// Smallest trackable unit within a phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "startedAt")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "completedAt")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "errorMessage")]
    pub error_message: Option<String>,
}

/// One unit of parallel work tracked as its own job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildJob {
    #[serde(deserialize_with = "string_or_number", alias = "jobId")]
    pub job_id: JobId,
    #[serde(default, deserialize_with = "opt_string_or_number", alias = "itemId")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "currentPhase")]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// A server-side resource created by the job (opaque beyond its id).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Counts of child jobs by outcome, for parallel jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub active: usize,
}

impl Job {
    /// Phases in order, each paired with its effective display status.
    pub fn phase_view(&self) -> Vec<(&Phase, StepStatus)> {
        self.phases
            .iter()
            .map(|phase| (phase, effective_phase_status(phase, self.progress.phase_stat(&phase.id))))
            .collect()
    }

    /// `true` if the job created at least one resource.
    pub fn has_created_resources(&self) -> bool {
        self.created_resources.values().any(|list| !list.is_empty())
    }

    /// Tally child jobs by status. Partial children count as failed.
    pub fn child_counts(&self) -> ChildCounts {
        let mut counts = ChildCounts {
            total: self.child_jobs.len(),
            ..Default::default()
        };
        for child in &self.child_jobs {
            match child.status {
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed | JobStatus::Partial | JobStatus::Cancelled => counts.failed += 1,
                _ => counts.active += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": 77,
        "status": "running",
        "progress": {
            "totalPhases": 3, "completedPhases": 1,
            "phaseStats": {"p2": {"name": "Provision", "completed": 3, "failed": 0, "running": 0, "total": 10}}
        },
        "phases": [
            {"id": "p1", "name": "Validate", "status": "completed", "durationSeconds": 1.5,
             "tasks": [{"id": "t1", "name": "Check", "status": "completed"}]},
            {"id": "p2", "name": "Provision", "status": "pending"},
            {"id": "p3", "name": "Notify", "status": "pending"}
        ],
        "createdResources": {"device": [{"id": 5, "name": "edge-1", "site": "north"}]},
        "errors": [],
        "summary": {"devices": 10}
    }"#;

    #[test]
    fn decodes_full_snapshot() {
        let job: Job = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(job.id, "77");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.phases.len(), 3);
        assert_eq!(job.phases[0].tasks.as_ref().unwrap().len(), 1);
        assert_eq!(job.phases[0].duration_seconds, Some(1.5));
        assert!(!job.is_parallel);
        assert!(job.child_jobs.is_empty());

        let device = &job.created_resources["device"][0];
        assert_eq!(device.id.as_deref(), Some("5"));
        assert_eq!(device.extra["site"], "north");
        assert!(job.has_created_resources());
    }

    #[test]
    fn phase_view_uses_effective_status() {
        let job: Job = serde_json::from_str(SAMPLE).unwrap();
        let view = job.phase_view();
        assert_eq!(view[0].1, StepStatus::Completed);
        // p2 reports pending but has per-unit progress.
        assert_eq!(view[1].1, StepStatus::Running);
        assert_eq!(view[2].1, StepStatus::Pending);
    }

    #[test]
    fn child_counts_tally_outcomes() {
        let job: Job = serde_json::from_str(
            r#"{"id": "p", "is_parallel": true, "child_jobs": [
                {"job_id": "c1", "item_id": 1, "status": "completed"},
                {"job_id": "c2", "item_id": 2, "status": "failed", "errors": ["boom"]},
                {"jobId": "c3", "itemId": "3", "status": "running", "currentPhase": "apply"},
                {"job_id": "c4", "status": "partial"}
            ]}"#,
        )
        .unwrap();
        assert!(job.is_parallel);
        let counts = job.child_counts();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.active, 1);
        assert_eq!(job.child_jobs[2].current_phase.as_deref(), Some("apply"));
    }

    #[test]
    fn reserialization_is_deterministic() {
        let job: Job = serde_json::from_str(SAMPLE).unwrap();
        let a = serde_json::to_string(&job).unwrap();
        let b = serde_json::to_string(&job.clone()).unwrap();
        assert_eq!(a, b);
        let again: Job = serde_json::from_str(&a).unwrap();
        assert_eq!(again, job);
    }
}
