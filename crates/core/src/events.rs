//! Typed push events decoded from the job event stream.
//!
//! Each stream message carries an event name (the SSE `event:` field, or
//! a `type` field inside the JSON body for unnamed frames) and a JSON
//! payload. [`decode_event`] turns one raw message into a [`StreamEvent`];
//! anything it cannot decode is reported as an [`EventDecodeError`] so the
//! caller can skip that single message.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::backend::RawEvent;
use crate::job::Resource;
use crate::progress::Progress;
use crate::status::JobStatus;
use crate::types::opt_string_or_number;

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_STATUS: &str = "status";
pub const EVENT_PHASE_STARTED: &str = "phase_started";
pub const EVENT_PHASE_COMPLETED: &str = "phase_completed";
pub const EVENT_VALIDATION_FAILED: &str = "validation_failed";
pub const EVENT_TASK_STARTED: &str = "task_started";
pub const EVENT_TASK_COMPLETED: &str = "task_completed";
pub const EVENT_PROGRESS: &str = "progress";
pub const EVENT_PROGRESS_UPDATE: &str = "progress_update";
pub const EVENT_CHILD_COMPLETED: &str = "child_completed";
pub const EVENT_CHILD_FAILED: &str = "child_failed";
pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_JOB_COMPLETED: &str = "job_completed";
pub const EVENT_JOB_FAILED: &str = "job_failed";
pub const EVENT_JOB_CANCELLED: &str = "job_cancelled";

/// Every event kind the stream may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEventKind {
    Connected,
    Status,
    PhaseStarted,
    PhaseCompleted,
    ValidationFailed,
    TaskStarted,
    TaskCompleted,
    /// Both `progress` and `progress_update`.
    Progress,
    ChildCompleted,
    ChildFailed,
    Message,
    JobCompleted,
    JobFailed,
    JobCancelled,
}

impl StreamEventKind {
    /// Look up a kind by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            EVENT_CONNECTED => Self::Connected,
            EVENT_STATUS => Self::Status,
            EVENT_PHASE_STARTED => Self::PhaseStarted,
            EVENT_PHASE_COMPLETED => Self::PhaseCompleted,
            EVENT_VALIDATION_FAILED => Self::ValidationFailed,
            EVENT_TASK_STARTED => Self::TaskStarted,
            EVENT_TASK_COMPLETED => Self::TaskCompleted,
            EVENT_PROGRESS | EVENT_PROGRESS_UPDATE => Self::Progress,
            EVENT_CHILD_COMPLETED => Self::ChildCompleted,
            EVENT_CHILD_FAILED => Self::ChildFailed,
            EVENT_MESSAGE => Self::Message,
            EVENT_JOB_COMPLETED => Self::JobCompleted,
            EVENT_JOB_FAILED => Self::JobFailed,
            EVENT_JOB_CANCELLED => Self::JobCancelled,
            _ => return None,
        };
        Some(kind)
    }

    /// `true` for the three events that end a job.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::JobCompleted | Self::JobFailed | Self::JobCancelled
        )
    }

    /// Status implied by a terminal event when the payload carries none.
    pub fn terminal_status(self) -> Option<JobStatus> {
        match self {
            Self::JobCompleted => Some(JobStatus::Completed),
            Self::JobFailed => Some(JobStatus::Failed),
            Self::JobCancelled => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

/// Union of every payload field any event kind may carry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventPayload {
    #[serde(default, deserialize_with = "opt_string_or_number", alias = "jobId")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default, deserialize_with = "opt_string_or_number", alias = "phaseId")]
    pub phase_id: Option<String>,
    #[serde(default, alias = "phaseName")]
    pub phase_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number", alias = "taskId")]
    pub task_id: Option<String>,
    #[serde(default, alias = "taskName")]
    pub task_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number", alias = "itemId")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub summary: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, alias = "createdResources")]
    pub created_resources: Option<BTreeMap<String, Vec<Resource>>>,
}

impl EventPayload {
    /// All error strings in the payload, `errors` first then `error`.
    pub fn all_errors(&self) -> Vec<String> {
        let mut out = self.errors.clone().unwrap_or_default();
        if let Some(e) = &self.error {
            if !out.contains(e) {
                out.push(e.clone());
            }
        }
        out
    }
}

/// One decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    pub payload: EventPayload,
}

/// Severity of a `message` event, mapped to a display icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Other,
}

impl Severity {
    pub fn from_level(level: Option<&str>) -> Self {
        match level.map(str::to_ascii_lowercase).as_deref() {
            Some("info") | None => Severity::Info,
            Some("success") => Severity::Success,
            Some("warning") | Some("warn") => Severity::Warning,
            Some("error") => Severity::Error,
            Some(_) => Severity::Other,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Success => "✔",
            Severity::Warning => "⚠",
            Severity::Error => "✖",
            Severity::Other => "•",
        }
    }
}

/// Reasons a raw stream message could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("Message has no event name")]
    MissingKind,

    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Decode one raw stream message.
///
/// The SSE event name wins when present and not the default `message`
/// name. Otherwise the JSON body's `type` field names the event, and a
/// nested `data` object, if present, is the payload.
pub fn decode_event(raw: &RawEvent) -> Result<StreamEvent, EventDecodeError> {
    let body: serde_json::Value = if raw.data.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(&raw.data)?
    };

    let named = raw
        .event
        .as_deref()
        .filter(|name| !name.is_empty() && *name != EVENT_MESSAGE);

    let (name, payload_value) = match named {
        Some(name) => (name.to_string(), body),
        None => match body.get("type").and_then(|t| t.as_str()) {
            Some(name) => {
                let name = name.to_string();
                let payload = match body.get("data") {
                    Some(data) if data.is_object() => data.clone(),
                    _ => body,
                };
                (name, payload)
            }
            // An unnamed frame without a `type` is a plain `message` event.
            None if raw.event.as_deref() == Some(EVENT_MESSAGE) => {
                (EVENT_MESSAGE.to_string(), body)
            }
            None => return Err(EventDecodeError::MissingKind),
        },
    };

    let kind =
        StreamEventKind::from_name(&name).ok_or(EventDecodeError::UnknownKind(name))?;
    let payload: EventPayload = serde_json::from_value(payload_value)?;

    Ok(StreamEvent { kind, payload })
}
