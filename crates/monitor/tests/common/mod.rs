//! In-memory `JobBackend` used by the monitor integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use jobsync_core::backend::{BackendError, CancelResponse, EventStream, JobBackend, RawEvent};
use jobsync_core::job::{Job, Phase};
use jobsync_core::status::{JobStatus, StepStatus};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type StreamItem = Result<RawEvent, BackendError>;

struct FakeState {
    job: Job,
    fail_pulls: bool,
    pull_delays: VecDeque<Duration>,
    streams: VecDeque<mpsc::UnboundedReceiver<StreamItem>>,
    cancel_result: Result<CancelResponse, BackendError>,
    cancel_delay: Duration,
}

/// Scriptable backend. Pulls return a clone of the current job taken when
/// the request starts; streams are handed out in the order they were
/// queued with [`FakeBackend::push_stream`].
pub struct FakeBackend {
    state: Mutex<FakeState>,
    pulls: AtomicUsize,
    cancels: AtomicUsize,
    opens: AtomicUsize,
}

impl FakeBackend {
    pub fn new(job: Job) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                job,
                fail_pulls: false,
                pull_delays: VecDeque::new(),
                streams: VecDeque::new(),
                cancel_result: Ok(CancelResponse {
                    message: "Cancellation requested for job 42".to_string(),
                }),
                cancel_delay: Duration::ZERO,
            }),
            pulls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        })
    }

    /// Queue a stream for the next `open_stream` call. With no stream
    /// queued, opening fails with a request error.
    pub fn push_stream(&self) -> StreamTx {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().streams.push_back(rx);
        StreamTx(tx)
    }

    pub fn set_status(&self, status: JobStatus) {
        self.state.lock().unwrap().job.status = status;
    }

    pub fn set_job(&self, job: Job) {
        self.state.lock().unwrap().job = job;
    }

    pub fn fail_pulls(&self, fail: bool) {
        self.state.lock().unwrap().fail_pulls = fail;
    }

    /// Latency of upcoming pulls, in order. Pulls beyond the queue answer
    /// immediately.
    pub fn delay_next_pull(&self, delay: Duration) {
        self.state.lock().unwrap().pull_delays.push_back(delay);
    }

    pub fn set_cancel_result(&self, result: Result<CancelResponse, BackendError>) {
        self.state.lock().unwrap().cancel_result = result;
    }

    pub fn set_cancel_delay(&self, delay: Duration) {
        self.state.lock().unwrap().cancel_delay = delay;
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn fetch_status(&self, _job_id: &str) -> Result<Job, BackendError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            let result = if state.fail_pulls {
                Err(BackendError::Request("connection refused".to_string()))
            } else {
                Ok(state.job.clone())
            };
            (result, state.pull_delays.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn cancel_job(&self, _job_id: &str) -> Result<CancelResponse, BackendError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        let (result, delay) = {
            let state = self.state.lock().unwrap();
            (state.cancel_result.clone(), state.cancel_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn open_stream(&self, _job_id: &str) -> Result<EventStream, BackendError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().unwrap().streams.pop_front() {
            Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            None => Err(BackendError::Request("connection refused".to_string())),
        }
    }
}

/// Server side of a fake event stream. Dropping it closes the stream.
pub struct StreamTx(mpsc::UnboundedSender<StreamItem>);

impl StreamTx {
    pub fn send(&self, name: &str, data: &str) {
        let _ = self.0.send(Ok(RawEvent {
            event: Some(name.to_string()),
            data: data.to_string(),
            id: None,
        }));
    }

    pub fn send_raw(&self, raw: RawEvent) {
        let _ = self.0.send(Ok(raw));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.0.send(Err(BackendError::Stream(reason.to_string())));
    }

    /// `true` once the monitor dropped its end of the stream.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// A running three-phase sequential job.
pub fn three_phase_job() -> Job {
    let phase = |id: &str, name: &str, status| Phase {
        id: id.to_string(),
        name: name.to_string(),
        status,
        ..Default::default()
    };
    Job {
        id: "42".to_string(),
        status: JobStatus::Running,
        phases: vec![
            phase("p1", "Validate", StepStatus::Completed),
            phase("p2", "Provision", StepStatus::Running),
            phase("p3", "Notify", StepStatus::Pending),
        ],
        ..Default::default()
    }
}

/// Let the monitor task drain everything that is ready without moving the
/// paused clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
