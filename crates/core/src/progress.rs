//! The progress union carried by jobs and child jobs.
//!
//! The server reports progress in one of three shapes, told apart only
//! by which fields are populated:
//!
//! - task-counted: `total_tasks`, `completed`, `failed`, `pending`, `percent`
//! - phase-counted: `total_phases`, `completed_phases`, `failed_phases`,
//!   `running_phases`, `phase_percent`
//! - unit-counted (parallel work): `total_items`, `completed`, `failed`,
//!   `running`, `pending`
//!
//! Any shape may additionally carry `phase_stats`, a per-phase breakdown
//! keyed by phase id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::status::StepStatus;

/// Which representation a [`Progress`] value uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Tasks,
    Phases,
    Units,
    Empty,
}

/// Progress counters as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "totalTasks")]
    pub total_tasks: Option<u64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "completed_work",
        alias = "completedWork"
    )]
    pub completed: Option<u64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "units_failed",
        alias = "unitsFailed"
    )]
    pub failed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "totalPhases")]
    pub total_phases: Option<u64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "completedPhases"
    )]
    pub completed_phases: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "failedPhases")]
    pub failed_phases: Option<u64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "runningPhases"
    )]
    pub running_phases: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "phasePercent")]
    pub phase_percent: Option<f64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "totalItems",
        alias = "total_work",
        alias = "totalWork"
    )]
    pub total_items: Option<u64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", alias = "phaseStats")]
    pub phase_stats: BTreeMap<String, PhaseStat>,
}

/// Per-phase statistics. A stat with `total` set describes a per-unit
/// phase; without it the phase is task-based.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStat {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
}

impl PhaseStat {
    /// `true` when the phase is tracked per unit rather than per task.
    pub fn is_per_unit(&self) -> bool {
        self.total.is_some()
    }
}

impl Progress {
    /// Classify the progress representation by its populated fields.
    pub fn kind(&self) -> ProgressKind {
        if self.total_phases.is_some() {
            ProgressKind::Phases
        } else if self.total_tasks.is_some() {
            ProgressKind::Tasks
        } else if self.total_items.is_some() {
            ProgressKind::Units
        } else {
            ProgressKind::Empty
        }
    }

    /// Statistics for one phase, if the server reported any.
    pub fn phase_stat(&self, phase_id: &str) -> Option<&PhaseStat> {
        self.phase_stats.get(phase_id)
    }

    /// Completion percentage in `0.0..=100.0` for display.
    ///
    /// A server-reported percentage wins over one computed from counts.
    /// For unit-counted progress, failed units count as processed.
    pub fn percent_complete(&self) -> f64 {
        let value = match self.kind() {
            ProgressKind::Phases => self.phase_percent.unwrap_or_else(|| {
                ratio(self.completed_phases.unwrap_or(0), self.total_phases)
            }),
            ProgressKind::Tasks => self
                .percent
                .unwrap_or_else(|| ratio(self.completed.unwrap_or(0), self.total_tasks)),
            ProgressKind::Units => self.percent.unwrap_or_else(|| {
                let done = self.completed.unwrap_or(0) + self.failed.unwrap_or(0);
                ratio(done, self.total_items)
            }),
            ProgressKind::Empty => self.percent.unwrap_or(0.0),
        };
        value.clamp(0.0, 100.0)
    }
}

fn ratio(done: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => done as f64 / total as f64 * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_task_progress() {
        let p: Progress = serde_json::from_str(
            r#"{"total_tasks": 8, "completed": 2, "failed": 0, "pending": 6, "percent": 25.0}"#,
        )
        .unwrap();
        assert_eq!(p.kind(), ProgressKind::Tasks);
        assert_eq!(p.percent_complete(), 25.0);
    }

    #[test]
    fn classifies_phase_progress_from_camel_case() {
        let p: Progress = serde_json::from_str(
            r#"{"totalPhases": 4, "completedPhases": 1, "failedPhases": 0, "runningPhases": 1}"#,
        )
        .unwrap();
        assert_eq!(p.kind(), ProgressKind::Phases);
        assert_eq!(p.percent_complete(), 25.0);
    }

    #[test]
    fn classifies_unit_progress_with_aliases() {
        let p: Progress = serde_json::from_str(
            r#"{"totalWork": 10, "completedWork": 3, "unitsFailed": 1, "running": 2}"#,
        )
        .unwrap();
        assert_eq!(p.kind(), ProgressKind::Units);
        assert_eq!(p.total_items, Some(10));
        assert_eq!(p.completed, Some(3));
        assert_eq!(p.failed, Some(1));
        assert_eq!(p.percent_complete(), 40.0);
    }

    #[test]
    fn empty_progress_is_zero_percent() {
        let p = Progress::default();
        assert_eq!(p.kind(), ProgressKind::Empty);
        assert_eq!(p.percent_complete(), 0.0);
    }

    #[test]
    fn percent_is_clamped() {
        let p = Progress {
            total_tasks: Some(1),
            percent: Some(140.0),
            ..Default::default()
        };
        assert_eq!(p.percent_complete(), 100.0);
    }

    #[test]
    fn phase_stats_mark_per_unit_phases() {
        let p: Progress = serde_json::from_str(
            r#"{"total_items": 5, "phase_stats": {
                "render": {"name": "Render", "completed": 2, "total": 5},
                "setup": {"name": "Setup", "status": "completed"}
            }}"#,
        )
        .unwrap();
        assert!(p.phase_stat("render").unwrap().is_per_unit());
        assert!(!p.phase_stat("setup").unwrap().is_per_unit());
        assert!(p.phase_stat("missing").is_none());
    }
}
