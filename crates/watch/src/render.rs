//! Plain-text rendering of a [`MonitorView`].
//!
//! The monitor republishes the whole view on every change; the helpers
//! here turn that into an append-only terminal transcript.

use jobsync_core::event_log::LogEntry;
use jobsync_core::job::Job;
use jobsync_monitor::{Freshness, JobCompletion, MonitorView};

/// Tracks which live-log lines were already printed.
#[derive(Debug, Default)]
pub struct LogCursor {
    last_seen: Option<LogEntry>,
}

impl LogCursor {
    /// Entries added since the previous call, oldest first.
    ///
    /// If the previously seen entry has been evicted from the bounded log,
    /// every retained entry counts as new.
    pub fn advance<'a>(&mut self, log: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        let unseen = match &self.last_seen {
            Some(seen) => log.iter().position(|entry| entry == seen).unwrap_or(log.len()),
            None => log.len(),
        };
        if let Some(newest) = log.first() {
            self.last_seen = Some(newest.clone());
        }
        log[..unseen].iter().rev().collect()
    }
}

pub fn format_entry(entry: &LogEntry) -> String {
    format!("{} {}", entry.timestamp.format("%H:%M:%S"), entry.message)
}

/// One-line summary: status, percent, connection and freshness.
pub fn status_line(view: &MonitorView) -> String {
    let mut line = match &view.job {
        Some(job) => format!(
            "[{}] {:.0}%",
            job.status.label(),
            job.progress.percent_complete()
        ),
        None => "[loading]".to_string(),
    };
    line.push_str(&format!(" | stream {}", view.connection));
    if view.polling {
        line.push_str(" (polling)");
    }
    if let Freshness::Stale { last_error } = &view.freshness {
        line.push_str(&format!(" | stale: {last_error}"));
    }
    if view.cancel_in_flight {
        line.push_str(" | cancelling");
    }
    line
}

/// Phase list with effective statuses, or child-job counts for parallel
/// jobs.
pub fn phase_lines(job: &Job) -> Vec<String> {
    if job.is_parallel {
        let counts = job.child_counts();
        return vec![format!(
            "  children: {} total, {} completed, {} failed, {} active",
            counts.total, counts.completed, counts.failed, counts.active
        )];
    }
    job.phase_view()
        .into_iter()
        .map(|(phase, status)| {
            let name = if phase.name.is_empty() { &phase.id } else { &phase.name };
            format!("  {:<12} {}", status.label(), name)
        })
        .collect()
}

pub fn completion_json(done: &JobCompletion) -> String {
    serde_json::to_string_pretty(done).expect("JobCompletion serialization is infallible")
}
