//! The seam between the synchronization engine and the network.
//!
//! [`JobBackend`] covers the three server endpoints the engine uses. The
//! HTTP implementation lives in `jobsync-client`; tests substitute an
//! in-memory fake.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::job::Job;

/// One undecoded message from the push stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    /// SSE `event:` field, if the frame carried one.
    pub event: Option<String>,
    /// SSE `data:` lines joined with `\n`.
    pub data: String,
    /// SSE `id:` field, if present.
    pub id: Option<String>,
}

/// Live push connection. Yields messages until the transport fails
/// (`Some(Err(_))`) or the server closes it (`None`).
pub type EventStream = BoxStream<'static, Result<RawEvent, BackendError>>;

/// Response body of `POST /jobs/{id}/cancel`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub message: String,
}

/// Errors surfaced by a [`JobBackend`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("Server error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The push stream broke after it was opened.
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Server endpoints consumed by the synchronization engine.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// `GET /jobs/{id}/status`
    async fn fetch_status(&self, job_id: &str) -> Result<Job, BackendError>;

    /// `POST /jobs/{id}/cancel`
    async fn cancel_job(&self, job_id: &str) -> Result<CancelResponse, BackendError>;

    /// `GET /jobs/{id}/stream`
    async fn open_stream(&self, job_id: &str) -> Result<EventStream, BackendError>;
}
