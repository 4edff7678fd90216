//! REST client for the job status endpoints.
//!
//! Wraps `GET /jobs/{id}/status`, `POST /jobs/{id}/cancel` and the
//! request half of `GET /jobs/{id}/stream` using [`reqwest`].

use jobsync_core::backend::{BackendError, CancelResponse};
use jobsync_core::job::Job;

use crate::config::ClientConfig;

/// HTTP client for one job service.
#[derive(Clone)]
pub struct JobApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: std::time::Duration,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum JobApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service did not answer with response headers in time.
    #[error("No response within {0:?}")]
    Timeout(std::time::Duration),

    /// The service returned a non-2xx status code.
    #[error("Job service error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<JobApiError> for BackendError {
    fn from(err: JobApiError) -> Self {
        match err {
            JobApiError::Request(e) if e.is_decode() => BackendError::Decode(e.to_string()),
            JobApiError::Request(e) => BackendError::Request(e.to_string()),
            e @ JobApiError::Timeout(_) => BackendError::Request(e.to_string()),
            JobApiError::ApiError { status, body } => BackendError::Api { status, body },
        }
    }
}

impl JobApi {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across several monitored jobs).
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the full job snapshot.
    pub async fn fetch_status(&self, job_id: &str) -> Result<Job, JobApiError> {
        let response = self
            .client
            .get(self.job_url(job_id, "status"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Ask the service to cancel a job.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelResponse, JobApiError> {
        let response = self
            .client
            .post(self.job_url(job_id, "cancel"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Open the event stream and return the streaming response once the
    /// server has accepted it.
    ///
    /// Only the wait for response headers is bounded by the request
    /// timeout; the body stays open for the life of the job.
    pub async fn open_stream(&self, job_id: &str) -> Result<reqwest::Response, JobApiError> {
        let url = self.job_url(job_id, "stream");
        tracing::debug!(job_id, url = %url, "Opening job event stream");

        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send();

        let response = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| JobApiError::Timeout(self.request_timeout))??;

        Self::ensure_success(response).await
    }

    // ---- private helpers ----

    fn job_url(&self, job_id: &str, action: &str) -> String {
        format!("{}/jobs/{}/{}", self.base_url, job_id, action)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`JobApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, JobApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JobApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_urls_strip_trailing_slash() {
        let api = JobApi::new(&ClientConfig {
            base_url: "http://svc.local/api/".to_string(),
            ..Default::default()
        });
        assert_eq!(api.base_url(), "http://svc.local/api");
        assert_eq!(
            api.job_url("42", "status"),
            "http://svc.local/api/jobs/42/status"
        );
        assert_eq!(
            api.job_url("42", "cancel"),
            "http://svc.local/api/jobs/42/cancel"
        );
    }

    #[test]
    fn api_error_maps_to_backend_error() {
        let err: BackendError = JobApiError::ApiError {
            status: 404,
            body: "no such job".to_string(),
        }
        .into();
        match err {
            BackendError::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such job");
            }
            other => panic!("Expected Api, got {other:?}"),
        }
    }

    #[test]
    fn timeout_maps_to_request_error() {
        let err: BackendError = JobApiError::Timeout(std::time::Duration::from_secs(1)).into();
        assert!(matches!(err, BackendError::Request(_)));
    }
}
