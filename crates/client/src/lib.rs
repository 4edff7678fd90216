//! HTTP client for the workflow-job status endpoints.
//!
//! Provides the REST wrappers for fetching a job snapshot and cancelling
//! a job, a server-sent-events reader for the job event stream, and the
//! [`JobBackend`](jobsync_core::backend::JobBackend) implementation that
//! plugs all three into the synchronization engine.

pub mod api;
pub mod backend;
pub mod config;
pub mod sse;
pub mod stream;

pub use api::{JobApi, JobApiError};
pub use config::ClientConfig;
