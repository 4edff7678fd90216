//! [`JobBackend`] implementation over HTTP.

use async_trait::async_trait;
use jobsync_core::backend::{BackendError, CancelResponse, EventStream, JobBackend};
use jobsync_core::job::Job;

use crate::api::JobApi;
use crate::stream::response_events;

#[async_trait]
impl JobBackend for JobApi {
    async fn fetch_status(&self, job_id: &str) -> Result<Job, BackendError> {
        Ok(JobApi::fetch_status(self, job_id).await?)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<CancelResponse, BackendError> {
        Ok(self.cancel(job_id).await?)
    }

    async fn open_stream(&self, job_id: &str) -> Result<EventStream, BackendError> {
        let response = JobApi::open_stream(self, job_id).await?;
        Ok(response_events(response))
    }
}
