//! Live status synchronization engine for one workflow job.
//!
//! [`JobMonitor::spawn`] starts a single actor task per monitored job.
//! The actor owns the job snapshot, the live event log, the push-stream
//! connection and every timer; the host talks to it through a
//! [`MonitorHandle`] and renders from the [`MonitorView`] it publishes.
//!
//! The moving parts are kept separately testable:
//!
//! - [`connection`] -- pure connection-lifecycle state machine.
//! - [`dispatcher`] -- turns decoded events into log lines and refresh requests.
//! - [`throttle`] -- trailing-edge refresh coalescing.
//! - [`snapshot`] -- sequence-checked snapshot replacement and freshness.
//! - [`cancel`] -- duplicate-cancel guard.
//! - [`completion`] -- normalized result handed to the completion callback.

pub mod cancel;
pub mod completion;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod reconnect;
pub mod snapshot;
pub mod throttle;
pub mod timer;

pub use completion::JobCompletion;
pub use config::MonitorConfig;
pub use connection::ConnectionState;
pub use error::MonitorError;
pub use monitor::{JobMonitor, MonitorHandle, MonitorView};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use snapshot::Freshness;
