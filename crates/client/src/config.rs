use std::time::Duration;

/// Default base URL of the job service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default timeout for status and cancel requests and for opening the
/// event stream.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the job service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the `/jobs/...` paths are appended to.
    pub base_url: String,
    /// Timeout for status and cancel requests, and for the event stream's
    /// response headers. An open stream body is never timed out.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                      |
    /// |--------------------------------|------------------------------|
    /// | `JOBSYNC_BASE_URL`             | `http://localhost:8000/api`  |
    /// | `JOBSYNC_REQUEST_TIMEOUT_SECS` | `30`                         |
    ///
    /// Malformed numbers fall back to the default with a warning.
    pub fn from_env() -> Self {
        let base_url = std::env::var("JOBSYNC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let request_timeout = match std::env::var("JOBSYNC_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "JOBSYNC_REQUEST_TIMEOUT_SECS is not a positive integer, using default",
                    );
                    DEFAULT_REQUEST_TIMEOUT
                }
            },
            Err(_) => DEFAULT_REQUEST_TIMEOUT,
        };

        Self {
            base_url,
            request_timeout,
        }
    }
}
