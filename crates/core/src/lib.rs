//! Core types for live workflow-job status synchronization.
//!
//! Everything in this crate is pure: the job tree model, status enums,
//! the progress union, effective-status derivation, the bounded live
//! event log, stream-event decoding, and the [`backend::JobBackend`]
//! trait that network implementations plug into. No I/O happens here.

pub mod backend;
pub mod effective;
pub mod error;
pub mod event_log;
pub mod events;
pub mod job;
pub mod progress;
pub mod status;
pub mod types;
