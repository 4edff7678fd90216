//! The per-job monitor actor and its host-facing handle.
//!
//! [`JobMonitor::spawn`] starts one Tokio task per monitored job. The task
//! owns every piece of mutable state (snapshot, live log, connection,
//! timers) and multiplexes host commands, push events, in-flight requests
//! and timers in a single `select!` loop, so handlers always run to
//! completion before the next input is looked at.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use jobsync_core::backend::{BackendError, CancelResponse, EventStream, JobBackend, RawEvent};
use jobsync_core::event_log::{LiveEventLog, LogEntry};
use jobsync_core::events::{decode_event, StreamEvent, StreamEventKind};
use jobsync_core::job::Job;
use jobsync_core::status::JobStatus;
use jobsync_core::types::{validate_job_id, JobId, Timestamp};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cancel::CancellationController;
use crate::completion::JobCompletion;
use crate::config::MonitorConfig;
use crate::connection::{ConnectionEffect, ConnectionInput, ConnectionMachine, ConnectionState};
use crate::dispatcher::{dispatch, RefreshRequest};
use crate::error::MonitorError;
use crate::snapshot::{ApplyOutcome, Freshness, SnapshotStore};
use crate::throttle::{RefreshThrottler, ThrottleDecision};
use crate::timer::{DeadlineTimer, PollTimer};

/// How long [`MonitorHandle::stop`] waits for the actor to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

type CompletionCallback = Box<dyn FnOnce(JobCompletion) + Send>;

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Everything the host needs to render one job, published after each
/// input the actor handles.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorView {
    pub job_id: JobId,
    /// Last applied snapshot; `None` until the first pull succeeds.
    pub job: Option<Arc<Job>>,
    pub freshness: Freshness,
    pub updated_at: Option<Timestamp>,
    /// Latest status seen from a pull or a terminal push. Can be ahead of
    /// the snapshot when the server has not caught up with its own push.
    pub last_status: Option<JobStatus>,
    pub connection: ConnectionState,
    /// `true` while the fallback poll is running.
    pub polling: bool,
    pub cancel_in_flight: bool,
    /// Set once a terminal push event was delivered to the callback.
    pub completion: Option<JobCompletion>,
    /// Live event log, newest first.
    pub log: Vec<LogEntry>,
}

impl MonitorView {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            job: None,
            freshness: Freshness::Unloaded,
            updated_at: None,
            last_status: None,
            connection: ConnectionState::Connecting,
            polling: false,
            cancel_in_flight: false,
            completion: None,
            log: Vec::new(),
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(|job| job.status)
    }

    /// `true` once the job is known to be over, from the snapshot or from
    /// a terminal push the snapshot has not caught up with.
    pub fn is_finished(&self) -> bool {
        self.status()
            .into_iter()
            .chain(self.last_status)
            .any(JobStatus::is_terminal)
    }
}

/// Entry point for monitoring a job.
pub struct JobMonitor;

impl JobMonitor {
    /// Validate `job_id` and start monitoring it.
    ///
    /// Must be called from within a Tokio runtime. `on_complete` runs at
    /// most once, on the actor task, when a terminal push event arrives.
    pub fn spawn<F>(
        backend: Arc<dyn JobBackend>,
        job_id: impl Into<JobId>,
        config: MonitorConfig,
        on_complete: F,
    ) -> Result<MonitorHandle, MonitorError>
    where
        F: FnOnce(JobCompletion) + Send + 'static,
    {
        let job_id = job_id.into();
        validate_job_id(&job_id)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(MonitorView::new(job_id.clone()));
        let shutdown = CancellationToken::new();

        let actor = Actor::new(job_id.clone(), backend, config, Box::new(on_complete), view_tx);
        let token = shutdown.clone();
        let task = tokio::spawn(actor.run(command_rx, token));

        Ok(MonitorHandle {
            job_id,
            commands: command_tx,
            view: view_rx,
            shutdown,
            task: Some(task),
        })
    }
}

/// Host-side handle to a running monitor. Dropping it stops the monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    job_id: JobId,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<MonitorView>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Ask the server to cancel the job. Repeated calls while a request
    /// is in flight are ignored by the actor.
    pub fn cancel(&self) -> Result<(), MonitorError> {
        self.send(Command::Cancel)
    }

    /// Re-open the event stream after it dropped.
    pub fn reconnect(&self) -> Result<(), MonitorError> {
        self.send(Command::Reconnect)
    }

    /// Current view.
    pub fn view(&self) -> MonitorView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified whenever the view changes.
    pub fn subscribe(&self) -> watch::Receiver<MonitorView> {
        self.view.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop monitoring: close the stream, clear every timer and wait for
    /// the actor to exit.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(STOP_TIMEOUT, task).await {
                Ok(Err(e)) => {
                    tracing::error!(job_id = %self.job_id, error = %e, "Monitor task failed")
                }
                Err(_) => {
                    tracing::warn!(job_id = %self.job_id, "Monitor task did not stop in time")
                }
                Ok(Ok(())) => {}
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), MonitorError> {
        self.commands
            .send(command)
            .map_err(|_| MonitorError::Stopped(self.job_id.clone()))
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Command {
    Cancel,
    Reconnect,
}

/// Why a pull was issued, for diagnostics.
#[derive(Debug, Clone, Copy)]
enum PullReason {
    Initial,
    Throttled,
    Immediate,
    FallbackPoll,
    Reconnected,
    AfterCancel,
}

/// Completion of an in-flight request.
enum Io {
    Pulled {
        seq: u64,
        reason: PullReason,
        result: Result<Job, BackendError>,
    },
    Cancelled(Result<CancelResponse, BackendError>),
    Opened {
        attempt: u64,
        result: Result<EventStream, BackendError>,
    },
}

struct Actor {
    job_id: JobId,
    backend: Arc<dyn JobBackend>,
    config: MonitorConfig,

    machine: ConnectionMachine,
    stream: Option<EventStream>,
    connection_id: Option<Uuid>,
    open_attempt: u64,
    pending_open: Option<u64>,

    fallback_poll: PollTimer,
    reconnect_timer: DeadlineTimer,
    throttle_timer: DeadlineTimer,
    throttler: RefreshThrottler,

    snapshot: SnapshotStore,
    log: LiveEventLog,
    cancel: CancellationController,
    on_complete: Option<CompletionCallback>,
    completion: Option<JobCompletion>,

    inflight: FuturesUnordered<BoxFuture<'static, Io>>,
    view_tx: watch::Sender<MonitorView>,
}

impl Actor {
    fn new(
        job_id: JobId,
        backend: Arc<dyn JobBackend>,
        config: MonitorConfig,
        on_complete: CompletionCallback,
        view_tx: watch::Sender<MonitorView>,
    ) -> Self {
        Self {
            machine: ConnectionMachine::new(config.reconnect.clone()),
            throttler: RefreshThrottler::new(config.throttle_window),
            log: LiveEventLog::new(config.log_capacity),
            job_id,
            backend,
            config,
            stream: None,
            connection_id: None,
            open_attempt: 0,
            pending_open: None,
            fallback_poll: PollTimer::new("fallback_poll"),
            reconnect_timer: DeadlineTimer::new("reconnect"),
            throttle_timer: DeadlineTimer::new("throttle"),
            snapshot: SnapshotStore::new(),
            cancel: CancellationController::new(),
            on_complete: Some(on_complete),
            completion: None,
            inflight: FuturesUnordered::new(),
            view_tx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(job_id = %self.job_id, "Job monitor started");

        self.pull(PullReason::Initial);
        let effects = self.machine.start();
        self.apply(effects);
        self.publish();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Cancel) => self.request_cancel(),
                    Some(Command::Reconnect) => self.feed(ConnectionInput::ReconnectRequested),
                    None => break,
                },
                item = next_message(&mut self.stream) => self.on_stream_item(item),
                Some(io) = self.inflight.next(), if !self.inflight.is_empty() => self.on_io(io),
                _ = self.throttle_timer.fired() => {
                    self.throttle_timer.cancel();
                    self.pull(PullReason::Throttled);
                }
                _ = self.fallback_poll.tick() => self.pull(PullReason::FallbackPoll),
                _ = self.reconnect_timer.fired() => {
                    self.reconnect_timer.cancel();
                    self.feed(ConnectionInput::ReconnectDue);
                }
            }
            self.publish();
        }

        self.teardown();
        tracing::info!(job_id = %self.job_id, "Job monitor stopped");
    }

    // ---- push stream ----

    fn on_stream_item(&mut self, item: Option<Result<RawEvent, BackendError>>) {
        let reason = match item {
            Some(Ok(raw)) => return self.on_raw_event(raw),
            Some(Err(e)) => e.to_string(),
            None => "stream closed by server".to_string(),
        };

        tracing::warn!(
            job_id = %self.job_id,
            connection_id = ?self.connection_id,
            reason = %reason,
            "Event stream lost",
        );
        self.stream = None;
        self.feed(ConnectionInput::TransportError(reason));
    }

    fn on_raw_event(&mut self, raw: RawEvent) {
        let event = match decode_event(&raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    connection_id = ?self.connection_id,
                    error = %e,
                    "Skipping malformed event",
                );
                return;
            }
        };

        let routed = dispatch(&event);
        self.log.push(routed.line);

        if event.kind == StreamEventKind::Connected {
            self.feed(ConnectionInput::ConnectedEvent);
        }

        match routed.refresh {
            RefreshRequest::None => {}
            RefreshRequest::Throttled => self.request_refresh(false),
            RefreshRequest::Immediate => self.request_refresh(true),
        }

        if event.kind.is_terminal() {
            self.on_terminal_event(&event);
        }
    }

    fn on_terminal_event(&mut self, event: &StreamEvent) {
        if event.kind == StreamEventKind::JobCancelled {
            self.cancel.release();
        }

        let snapshot = self.snapshot.job().map(Arc::as_ref);
        let Some(done) =
            JobCompletion::from_event(&self.job_id, event.kind, &event.payload, snapshot)
        else {
            return;
        };
        let status = done.status;

        if let Some(callback) = self.on_complete.take() {
            tracing::info!(job_id = %self.job_id, status = %status, "Job finished");
            self.completion = Some(done.clone());
            callback(done);
        }

        self.feed(ConnectionInput::StatusObserved(status));
    }

    // ---- pulls ----

    fn request_refresh(&mut self, immediate: bool) {
        match self.throttler.request(immediate, Instant::now()) {
            ThrottleDecision::PullNow => {
                let reason = if immediate {
                    PullReason::Immediate
                } else {
                    PullReason::Throttled
                };
                self.pull(reason);
            }
            ThrottleDecision::Schedule(delay) => self.throttle_timer.arm_after(delay),
            ThrottleDecision::Coalesced => {}
        }
    }

    fn pull(&mut self, reason: PullReason) {
        let seq = self.snapshot.next_seq();
        self.throttler.mark_pulled(Instant::now());
        self.throttle_timer.cancel();
        tracing::debug!(job_id = %self.job_id, seq, reason = ?reason, "Pulling job status");

        let backend = Arc::clone(&self.backend);
        let job_id = self.job_id.clone();
        self.inflight.push(Box::pin(async move {
            let result = backend.fetch_status(&job_id).await;
            Io::Pulled {
                seq,
                reason,
                result,
            }
        }));
    }

    fn on_pulled(&mut self, seq: u64, reason: PullReason, result: Result<Job, BackendError>) {
        let job = match result {
            Ok(job) => job,
            Err(e) => {
                if self.snapshot.record_failure(seq, e.to_string()) {
                    tracing::warn!(
                        job_id = %self.job_id,
                        seq,
                        reason = ?reason,
                        error = %e,
                        "Status pull failed",
                    );
                    self.log.push(format!("⚠ Status refresh failed: {e}"));
                }
                return;
            }
        };

        let status = job.status;
        match self.snapshot.apply(seq, job) {
            ApplyOutcome::Replaced { previous } => {
                if previous != Some(status) {
                    tracing::info!(job_id = %self.job_id, status = %status, "Job status changed");
                }
                self.observe(status);
            }
            ApplyOutcome::Unchanged => self.observe(status),
            ApplyOutcome::OutOfOrder => {
                tracing::debug!(job_id = %self.job_id, seq, "Discarding out-of-order status response");
            }
            ApplyOutcome::Regression => {
                tracing::warn!(
                    job_id = %self.job_id,
                    seq,
                    status = %status,
                    "Ignoring live status for a finished job",
                );
            }
        }
    }

    fn observe(&mut self, status: JobStatus) {
        if status.is_terminal() {
            self.cancel.release();
        }
        self.feed(ConnectionInput::StatusObserved(status));
    }

    // ---- cancellation ----

    fn request_cancel(&mut self) {
        if self.machine.is_terminal() {
            self.log.push("Job already finished, nothing to cancel");
            return;
        }
        if !self.cancel.begin() {
            tracing::debug!(job_id = %self.job_id, "Cancel already in flight");
            return;
        }

        self.log.push("Requesting cancellation…");
        let backend = Arc::clone(&self.backend);
        let job_id = self.job_id.clone();
        self.inflight.push(Box::pin(async move {
            Io::Cancelled(backend.cancel_job(&job_id).await)
        }));
    }

    fn on_cancel_result(&mut self, result: Result<CancelResponse, BackendError>) {
        match result {
            Ok(response) => {
                self.cancel.accepted();
                let message = if response.message.is_empty() {
                    "Cancellation requested".to_string()
                } else {
                    response.message
                };
                tracing::info!(job_id = %self.job_id, message = %message, "Cancellation accepted");
                self.log.push(message);
                self.pull(PullReason::AfterCancel);
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Cancellation failed");
                self.cancel.failed();
                self.log.push(format!("✖ Cancellation failed: {e}"));
            }
        }
    }

    // ---- connection ----

    fn open_stream(&mut self) {
        self.open_attempt += 1;
        let attempt = self.open_attempt;
        self.pending_open = Some(attempt);

        let connection_id = Uuid::new_v4();
        self.connection_id = Some(connection_id);
        tracing::info!(
            job_id = %self.job_id,
            connection_id = %connection_id,
            attempt,
            "Opening event stream",
        );

        let backend = Arc::clone(&self.backend);
        let job_id = self.job_id.clone();
        self.inflight.push(Box::pin(async move {
            let result = backend.open_stream(&job_id).await;
            Io::Opened { attempt, result }
        }));
    }

    fn on_opened(&mut self, attempt: u64, result: Result<EventStream, BackendError>) {
        if self.pending_open != Some(attempt) {
            tracing::debug!(job_id = %self.job_id, attempt, "Dropping superseded stream");
            return;
        }
        self.pending_open = None;

        match result {
            Ok(stream) => {
                tracing::info!(
                    job_id = %self.job_id,
                    connection_id = ?self.connection_id,
                    "Event stream open",
                );
                self.stream = Some(stream);
                self.feed(ConnectionInput::Opened);
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    connection_id = ?self.connection_id,
                    error = %e,
                    "Failed to open event stream",
                );
                self.feed(ConnectionInput::TransportError(e.to_string()));
            }
        }
    }

    fn feed(&mut self, input: ConnectionInput) {
        let effects = self.machine.handle(input);
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<ConnectionEffect>) {
        for effect in effects {
            match effect {
                ConnectionEffect::OpenStream => self.open_stream(),
                ConnectionEffect::CloseStream => {
                    if self.stream.take().is_some() {
                        tracing::debug!(job_id = %self.job_id, "Event stream closed");
                    }
                    self.pending_open = None;
                }
                ConnectionEffect::StartFallbackPoll => {
                    let interval = self.config.fallback_poll_interval;
                    tracing::info!(
                        job_id = %self.job_id,
                        timer = self.fallback_poll.name(),
                        interval_secs = interval.as_secs(),
                        "Starting fallback poll",
                    );
                    self.fallback_poll.start(interval);
                }
                ConnectionEffect::StopFallbackPoll => self.fallback_poll.stop(),
                ConnectionEffect::ScheduleReconnect(delay) => {
                    tracing::info!(
                        job_id = %self.job_id,
                        timer = self.reconnect_timer.name(),
                        delay_ms = delay.as_millis() as u64,
                        "Scheduling reconnect",
                    );
                    self.reconnect_timer.arm_after(delay);
                }
                ConnectionEffect::CancelReconnect => self.reconnect_timer.cancel(),
                ConnectionEffect::PullNow => self.pull(PullReason::Reconnected),
                ConnectionEffect::Log(line) => self.log.push(line),
            }
        }
    }

    // ---- plumbing ----

    fn on_io(&mut self, io: Io) {
        match io {
            Io::Pulled {
                seq,
                reason,
                result,
            } => self.on_pulled(seq, reason, result),
            Io::Cancelled(result) => self.on_cancel_result(result),
            Io::Opened { attempt, result } => self.on_opened(attempt, result),
        }
    }

    /// Release the stream, every timer and all in-flight requests.
    fn teardown(&mut self) {
        let effects = self.machine.handle(ConnectionInput::Shutdown);
        self.apply(effects);
        self.stream = None;
        self.pending_open = None;
        self.fallback_poll.stop();
        self.reconnect_timer.cancel();
        self.throttle_timer.cancel();
        self.inflight.clear();
        self.publish();
    }

    fn view(&self) -> MonitorView {
        MonitorView {
            job_id: self.job_id.clone(),
            job: self.snapshot.job().cloned(),
            freshness: self.snapshot.freshness(),
            updated_at: self.snapshot.updated_at(),
            last_status: self.machine.last_status(),
            connection: self.machine.state(),
            polling: self.fallback_poll.is_running(),
            cancel_in_flight: self.cancel.in_flight(),
            completion: self.completion.clone(),
            log: self.log.to_vec(),
        }
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

/// Next message from the stream, or never if no stream is open.
async fn next_message(stream: &mut Option<EventStream>) -> Option<Result<RawEvent, BackendError>> {
    match stream.as_mut() {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}
