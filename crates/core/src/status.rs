//! Lifecycle status enums for jobs and for their phases, tasks and units.
//!
//! Wire strings are `snake_case`; the upper-case spelling is accepted as
//! an alias. Strings the client does not know decode to `Unknown` rather
//! than failing the whole snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Job-level lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "RUNNING")]
    Running,
    #[serde(alias = "VALIDATING")]
    Validating,
    #[serde(alias = "AWAITING_CONFIRMATION")]
    AwaitingConfirmation,
    #[serde(alias = "COMPLETED")]
    Completed,
    #[serde(alias = "FAILED")]
    Failed,
    #[serde(alias = "PARTIAL")]
    Partial,
    #[serde(alias = "CANCELLED")]
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// `true` for statuses the job can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Partial | JobStatus::Cancelled
        )
    }

    /// Human-readable label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Validating => "validating",
            JobStatus::AwaitingConfirmation => "awaiting confirmation",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partially completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a phase, a task, or a per-unit phase statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "RUNNING")]
    Running,
    #[serde(alias = "COMPLETED")]
    Completed,
    #[serde(alias = "FAILED")]
    Failed,
    #[serde(alias = "SKIPPED")]
    Skipped,
    #[serde(alias = "CANCELLED")]
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl StepStatus {
    pub fn label(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Cancelled => "cancelled",
            StepStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
