//! Routing of decoded push events.
//!
//! Every event yields one log line. Events that imply the job changed also
//! ask for a refresh; terminal events ask for an immediate one. The actor
//! applies the returned [`Dispatch`]; nothing here mutates state.

use jobsync_core::events::{EventPayload, Severity, StreamEvent, StreamEventKind};

/// How urgently an event needs a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    None,
    /// Subject to the throttle window.
    Throttled,
    /// Bypass the throttle.
    Immediate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub line: String,
    pub refresh: RefreshRequest,
}

pub fn dispatch(event: &StreamEvent) -> Dispatch {
    Dispatch {
        line: render_line(event),
        refresh: refresh_for(event.kind),
    }
}

pub fn refresh_for(kind: StreamEventKind) -> RefreshRequest {
    use StreamEventKind::*;
    match kind {
        PhaseStarted | PhaseCompleted | ValidationFailed | TaskCompleted | Progress
        | ChildCompleted | ChildFailed => RefreshRequest::Throttled,
        JobCompleted | JobFailed | JobCancelled => RefreshRequest::Immediate,
        Connected | Status | TaskStarted | Message => RefreshRequest::None,
    }
}

/// Human-readable log line for one event.
pub fn render_line(event: &StreamEvent) -> String {
    let p = &event.payload;
    match event.kind {
        StreamEventKind::Connected => match &p.message {
            Some(msg) => format!("Connected to live updates: {msg}"),
            None => "Connected to live updates".to_string(),
        },
        StreamEventKind::Status => {
            let status = p.status.map(|s| s.label()).unwrap_or("unknown");
            match percent(p) {
                Some(pct) => format!("Status: {status} ({pct:.0}%)"),
                None => format!("Status: {status}"),
            }
        }
        StreamEventKind::PhaseStarted => format!("▶ Phase started: {}", phase_name(p)),
        StreamEventKind::PhaseCompleted => format!("✔ Phase completed: {}", phase_name(p)),
        StreamEventKind::ValidationFailed => {
            with_errors(format!("✖ Validation failed: {}", phase_name(p)), p)
        }
        StreamEventKind::TaskStarted => format!("Task started: {}{}", task_name(p), item_suffix(p)),
        StreamEventKind::TaskCompleted => {
            format!("Task completed: {}{}", task_name(p), item_suffix(p))
        }
        StreamEventKind::Progress => match percent(p) {
            Some(pct) => format!("Progress: {pct:.0}%"),
            None => "Progress updated".to_string(),
        },
        StreamEventKind::ChildCompleted => format!("✔ Child job {} completed", child_label(p)),
        StreamEventKind::ChildFailed => {
            with_errors(format!("✖ Child job {} failed", child_label(p)), p)
        }
        StreamEventKind::Message => {
            let icon = Severity::from_level(p.level.as_deref()).icon();
            format!("{icon} {}", p.message.as_deref().unwrap_or(""))
        }
        StreamEventKind::JobCompleted => match p.status.filter(|s| s.is_terminal()) {
            Some(status) => format!("✔ Job finished: {}", status.label()),
            None => "✔ Job completed".to_string(),
        },
        StreamEventKind::JobFailed => with_errors("✖ Job failed".to_string(), p),
        StreamEventKind::JobCancelled => "⚠ Job cancelled".to_string(),
    }
}

fn percent(p: &EventPayload) -> Option<f64> {
    p.percent
        .or_else(|| p.progress.as_ref().map(|progress| progress.percent_complete()))
        .map(|pct| pct.clamp(0.0, 100.0))
}

fn phase_name(p: &EventPayload) -> &str {
    p.phase_name
        .as_deref()
        .or(p.phase_id.as_deref())
        .unwrap_or("unnamed phase")
}

fn task_name(p: &EventPayload) -> &str {
    p.task_name
        .as_deref()
        .or(p.task_id.as_deref())
        .unwrap_or("unnamed task")
}

fn item_suffix(p: &EventPayload) -> String {
    p.item_id
        .as_deref()
        .map(|item| format!(" [item {item}]"))
        .unwrap_or_default()
}

fn child_label(p: &EventPayload) -> String {
    match (p.job_id.as_deref(), p.item_id.as_deref()) {
        (Some(job), Some(item)) => format!("{job} (item {item})"),
        (Some(job), None) => job.to_string(),
        (None, Some(item)) => format!("for item {item}"),
        (None, None) => "(unknown)".to_string(),
    }
}

fn with_errors(head: String, p: &EventPayload) -> String {
    let errors = p.all_errors();
    if errors.is_empty() {
        match &p.message {
            Some(msg) => format!("{head}: {msg}"),
            None => head,
        }
    } else {
        format!("{head}: {}", errors.join("; "))
    }
}
