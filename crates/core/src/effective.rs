//! Effective display status for phases and per-unit breakdowns.
//!
//! A phase can be described twice: by its own reported status and by an
//! entry in `progress.phase_stats`. The functions here reconcile the two
//! into one status. They are pure and hold no state.

use crate::job::Phase;
use crate::progress::PhaseStat;
use crate::status::StepStatus;

/// Derive the status to display for a reported status plus an optional
/// statistics entry.
///
/// Precedence:
/// 1. Either source says `Skipped` -> `Skipped`.
/// 2. Per-unit stat (has `total`):
///    - every unit completed (and there is at least one) -> `Completed`
///    - any unit running -> `Running`
///    - any unit completed or failed -> `Running` (partial progress between bursts)
///    - otherwise the reported status
/// 3. Task-based -> the reported status unchanged.
pub fn derive_effective_status(reported: StepStatus, stat: Option<&PhaseStat>) -> StepStatus {
    if reported == StepStatus::Skipped {
        return StepStatus::Skipped;
    }

    let Some(stat) = stat else {
        return reported;
    };

    if stat.status == Some(StepStatus::Skipped) {
        return StepStatus::Skipped;
    }

    let Some(total) = stat.total else {
        return reported;
    };

    let completed = stat.completed.unwrap_or(0);
    let failed = stat.failed.unwrap_or(0);
    let running = stat.running.unwrap_or(0);

    if total > 0 && completed == total {
        StepStatus::Completed
    } else if running > 0 || completed > 0 || failed > 0 {
        StepStatus::Running
    } else {
        reported
    }
}

/// Effective status of a [`Phase`] given its `phase_stats` entry.
pub fn effective_phase_status(phase: &Phase, stat: Option<&PhaseStat>) -> StepStatus {
    derive_effective_status(phase.status, stat)
}

/// Effective status of a statistics entry that has no matching phase.
///
/// Parallel jobs may report only `phase_stats`; the stat's own status (or
/// `Pending`) stands in for the phase's reported status.
pub fn derive_stat_status(stat: &PhaseStat) -> StepStatus {
    derive_effective_status(stat.status.unwrap_or_default(), Some(stat))
}
