use jobsync_core::error::CoreError;

/// Errors returned to the host by [`MonitorHandle`](crate::MonitorHandle).
///
/// Nothing that happens inside the actor (stream drops, failed pulls,
/// failed cancels, malformed events) is reported here; those degrade to
/// log lines and retained state.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The job id was rejected before any network activity.
    #[error("Invalid job id: {0}")]
    InvalidJobId(#[from] CoreError),

    /// The monitor task has already exited.
    #[error("Monitor for job {0} has stopped")]
    Stopped(String),
}
