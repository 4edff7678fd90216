//! Push-connection lifecycle as a pure state machine.
//!
//! The machine never touches the network or a timer. Every input returns
//! the list of effects the actor must carry out, in order, which keeps the
//! transition rules testable without I/O.
//!
//! ```text
//! Connecting ──open──▶ Connected ──error──▶ Disconnected ──retry──▶ Connecting
//!      └──────────────────────┴──── terminal status ───┴──────────▶ Closed
//! ```

use std::fmt;
use std::time::Duration;

use jobsync_core::status::JobStatus;
use serde::Serialize;

use crate::reconnect::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    /// The job is terminal; no further connection activity happens.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionInput {
    /// The stream request succeeded.
    Opened,
    /// The server sent a `connected` event.
    ConnectedEvent,
    /// The open attempt failed, the stream broke, or the server closed it.
    TransportError(String),
    /// The user asked to reconnect.
    ReconnectRequested,
    /// The reconnect backoff timer fired.
    ReconnectDue,
    /// A pull or terminal push event reported this job status.
    StatusObserved(JobStatus),
    /// Monitoring is stopping.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEffect {
    OpenStream,
    CloseStream,
    StartFallbackPoll,
    StopFallbackPoll,
    ScheduleReconnect(Duration),
    CancelReconnect,
    /// Unthrottled pull.
    PullNow,
    /// Line for the live event log.
    Log(String),
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    last_status: Option<JobStatus>,
    has_connected: bool,
    polling: bool,
    reconnect_pending: bool,
    /// Failed attempts since the stream was last open.
    failures: u32,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            policy,
            last_status: None,
            has_connected: false,
            polling: false,
            reconnect_pending: false,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status
    }

    pub fn is_terminal(&self) -> bool {
        self.last_status.is_some_and(JobStatus::is_terminal)
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Effects for the initial connection attempt.
    pub fn start(&mut self) -> Vec<ConnectionEffect> {
        self.state = ConnectionState::Connecting;
        vec![ConnectionEffect::OpenStream]
    }

    pub fn handle(&mut self, input: ConnectionInput) -> Vec<ConnectionEffect> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }

        match input {
            ConnectionInput::Opened | ConnectionInput::ConnectedEvent => self.on_open(),
            ConnectionInput::TransportError(reason) => self.on_transport_error(&reason),
            ConnectionInput::ReconnectRequested => self.on_manual_reconnect(),
            ConnectionInput::ReconnectDue => self.on_reconnect_due(),
            ConnectionInput::StatusObserved(status) => self.on_status(status),
            ConnectionInput::Shutdown => self.release_all(),
        }
    }

    fn on_open(&mut self) -> Vec<ConnectionEffect> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        self.failures = 0;

        let mut effects = Vec::new();
        if std::mem::take(&mut self.polling) {
            effects.push(ConnectionEffect::StopFallbackPoll);
        }
        if std::mem::take(&mut self.reconnect_pending) {
            effects.push(ConnectionEffect::CancelReconnect);
        }
        if self.has_connected {
            effects.push(ConnectionEffect::Log(
                "Reconnected to live updates, refreshing status".to_string(),
            ));
            effects.push(ConnectionEffect::PullNow);
        }
        self.has_connected = true;
        effects
    }

    fn on_transport_error(&mut self, reason: &str) -> Vec<ConnectionEffect> {
        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        if self.is_terminal() {
            return self.close();
        }

        self.state = ConnectionState::Disconnected;
        let mut effects = vec![ConnectionEffect::CloseStream];

        if !self.polling {
            self.polling = true;
            effects.push(ConnectionEffect::StartFallbackPoll);
            effects.push(ConnectionEffect::Log(format!(
                "Live updates disconnected ({reason}), polling for status"
            )));
        }

        if let Some(delay) = self.policy.retry_after(self.failures) {
            self.failures = self.failures.saturating_add(1);
            self.reconnect_pending = true;
            effects.push(ConnectionEffect::ScheduleReconnect(delay));
        }
        effects
    }

    /// A manual reconnect stops polling before opening, so the reconnect
    /// pull is the only one in flight.
    fn on_manual_reconnect(&mut self) -> Vec<ConnectionEffect> {
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.state = ConnectionState::Connecting;

        let mut effects = Vec::new();
        if std::mem::take(&mut self.reconnect_pending) {
            effects.push(ConnectionEffect::CancelReconnect);
        }
        if std::mem::take(&mut self.polling) {
            effects.push(ConnectionEffect::StopFallbackPoll);
        }
        effects.push(ConnectionEffect::Log("Reconnecting to live updates".to_string()));
        effects.push(ConnectionEffect::OpenStream);
        effects
    }

    /// Automatic attempts keep the fallback poll running until the stream
    /// actually opens; a backoff shorter than the poll interval would
    /// otherwise starve it.
    fn on_reconnect_due(&mut self) -> Vec<ConnectionEffect> {
        self.reconnect_pending = false;
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.state = ConnectionState::Connecting;
        vec![ConnectionEffect::OpenStream]
    }

    fn on_status(&mut self, status: JobStatus) -> Vec<ConnectionEffect> {
        self.last_status = Some(status);
        if status.is_terminal() {
            self.close()
        } else {
            Vec::new()
        }
    }

    fn close(&mut self) -> Vec<ConnectionEffect> {
        let effects = self.release_all();
        self.state = ConnectionState::Closed;
        effects
    }

    fn release_all(&mut self) -> Vec<ConnectionEffect> {
        self.polling = false;
        self.reconnect_pending = false;
        vec![
            ConnectionEffect::CloseStream,
            ConnectionEffect::StopFallbackPoll,
            ConnectionEffect::CancelReconnect,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::ReconnectConfig;
    use ConnectionEffect::*;

    fn backoff_machine() -> ConnectionMachine {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::default());
        machine.start();
        machine
    }

    fn starts_timer(effects: &[ConnectionEffect]) -> bool {
        effects
            .iter()
            .any(|e| matches!(e, StartFallbackPoll | ScheduleReconnect(_)))
    }

    #[test]
    fn first_open_connects_without_pull() {
        let mut machine = backoff_machine();
        let effects = machine.handle(ConnectionInput::Opened);

        assert_eq!(machine.state(), ConnectionState::Connected);
        assert!(effects.is_empty());
        // A `connected` event after the open is a no-op.
        assert!(machine.handle(ConnectionInput::ConnectedEvent).is_empty());
    }

    #[test]
    fn transport_error_falls_back_to_polling_and_schedules_retry() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::Opened);

        let effects = machine.handle(ConnectionInput::TransportError("reset".into()));
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(effects[0], CloseStream);
        assert_eq!(effects[1], StartFallbackPoll);
        assert!(matches!(&effects[2], Log(line) if line.contains("reset")));
        assert_eq!(effects[3], ScheduleReconnect(Duration::from_secs(1)));
    }

    #[test]
    fn reconnection_pulls_and_stops_polling() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::Opened);
        machine.handle(ConnectionInput::TransportError("reset".into()));

        assert_eq!(machine.handle(ConnectionInput::ReconnectDue), vec![OpenStream]);
        // Polling keeps running while the automatic attempt is pending.
        assert!(machine.is_polling());

        let effects = machine.handle(ConnectionInput::Opened);
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert!(effects.contains(&StopFallbackPoll));
        assert!(effects.contains(&PullNow));
        assert!(!machine.is_polling());
    }

    #[test]
    fn failed_attempts_back_off_without_restarting_poll() {
        let mut machine = backoff_machine();
        let mut delays = Vec::new();

        for attempt in 0..4 {
            let effects = machine.handle(ConnectionInput::TransportError("refused".into()));
            assert_eq!(effects.contains(&StartFallbackPoll), attempt == 0);
            for effect in effects {
                if let ScheduleReconnect(d) = effect {
                    delays.push(d.as_secs());
                }
            }
            machine.handle(ConnectionInput::ReconnectDue);
        }

        assert_eq!(delays, vec![1, 2, 4, 8]);
    }

    #[test]
    fn backoff_resets_after_successful_open() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::TransportError("refused".into()));
        machine.handle(ConnectionInput::ReconnectDue);
        machine.handle(ConnectionInput::TransportError("refused".into()));
        machine.handle(ConnectionInput::ReconnectDue);
        machine.handle(ConnectionInput::Opened);

        let effects = machine.handle(ConnectionInput::TransportError("reset".into()));
        assert!(effects.contains(&ScheduleReconnect(Duration::from_secs(1))));
    }

    #[test]
    fn backoff_holds_at_ceiling_until_an_open_succeeds() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::Backoff(ReconnectConfig {
            max_delay: Duration::from_secs(3),
            ..Default::default()
        }));
        machine.start();

        let mut scheduled = || {
            let effects = machine.handle(ConnectionInput::TransportError("refused".into()));
            machine.handle(ConnectionInput::ReconnectDue);
            effects.into_iter().find_map(|e| match e {
                ScheduleReconnect(d) => Some(d.as_secs()),
                _ => None,
            })
        };
        let delays: Vec<_> = (0..5).filter_map(|_| scheduled()).collect();
        assert_eq!(delays, vec![1, 2, 3, 3, 3]);

        machine.handle(ConnectionInput::Opened);
        let effects = machine.handle(ConnectionInput::TransportError("reset".into()));
        assert!(effects.contains(&ScheduleReconnect(Duration::from_secs(1))));
    }

    #[test]
    fn manual_policy_waits_for_request() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::Manual);
        machine.start();
        machine.handle(ConnectionInput::Opened);

        let effects = machine.handle(ConnectionInput::TransportError("reset".into()));
        assert!(!effects.iter().any(|e| matches!(e, ScheduleReconnect(_))));

        let effects = machine.handle(ConnectionInput::ReconnectRequested);
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert_eq!(effects.first(), Some(&StopFallbackPoll));
        assert_eq!(effects.last(), Some(&OpenStream));
    }

    #[test]
    fn manual_reconnect_cancels_pending_backoff() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::TransportError("refused".into()));

        let effects = machine.handle(ConnectionInput::ReconnectRequested);
        assert_eq!(&effects[..2], &[CancelReconnect, StopFallbackPoll]);
    }

    #[test]
    fn reconnect_ignored_unless_disconnected() {
        let mut machine = backoff_machine();
        assert!(machine.handle(ConnectionInput::ReconnectRequested).is_empty());
        machine.handle(ConnectionInput::Opened);
        assert!(machine.handle(ConnectionInput::ReconnectRequested).is_empty());
    }

    #[test]
    fn terminal_status_closes_and_releases_timers() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::Opened);
        machine.handle(ConnectionInput::TransportError("reset".into()));

        let effects = machine.handle(ConnectionInput::StatusObserved(JobStatus::Completed));
        assert_eq!(machine.state(), ConnectionState::Closed);
        assert_eq!(effects, vec![CloseStream, StopFallbackPoll, CancelReconnect]);
    }

    #[test]
    fn closed_is_a_sink() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::StatusObserved(JobStatus::Failed));

        for input in [
            ConnectionInput::TransportError("late".into()),
            ConnectionInput::ReconnectRequested,
            ConnectionInput::ReconnectDue,
            ConnectionInput::Opened,
            ConnectionInput::StatusObserved(JobStatus::Running),
        ] {
            let effects = machine.handle(input);
            assert!(!starts_timer(&effects));
            assert!(!effects.contains(&OpenStream));
        }
        assert_eq!(machine.state(), ConnectionState::Closed);
    }

    #[test]
    fn non_terminal_status_keeps_state() {
        let mut machine = backoff_machine();
        machine.handle(ConnectionInput::Opened);
        assert!(machine
            .handle(ConnectionInput::StatusObserved(JobStatus::Running))
            .is_empty());
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert_eq!(machine.last_status(), Some(JobStatus::Running));
    }

    #[test]
    fn custom_backoff_config_is_used() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(250),
            ..Default::default()
        };
        let mut machine = ConnectionMachine::new(ReconnectPolicy::Backoff(config));
        machine.start();

        let effects = machine.handle(ConnectionInput::TransportError("refused".into()));
        assert!(effects.contains(&ScheduleReconnect(Duration::from_millis(250))));
    }
}
