//! Session state machine
//!
//! [`Session`] owns one monitoring lifecycle: it issues requests over its
//! [`Transport`], correlates the responses, applies the push stream to the
//! armed [`TagSet`] and the [`SampleSink`], and runs the staleness
//! [`Watchdog`]. It never blocks and never reads the system clock directly.
//! Whoever drives it calls [`Session::pump`] regularly (or
//! [`Session::handle_event`] and [`Session::tick`] separately) and drains the
//! resulting [`SessionEvent`]s.
//!
//! At most one request is in flight at a time. Commands issued while a
//! response is still outstanding are refused with [`PlcWatchError::Busy`].

use super::events::SessionEvent;
use super::sink::{sink_for_mode, trend_capacity, SampleSink};
use super::tag_set::{check_unique, TagSet, TagSetEditor};
use super::watchdog::{Watchdog, WatchdogStatus};
use super::SessionState;
use crate::clock::Clock;
use crate::config::{AppConfig, SessionSettings, StalenessClock};
use crate::error::{PlcWatchError, Result};
use crate::protocol::{
    ClientEvent, ConnectResponse, FirstReadRequest, FirstReadResponse, ServerEvent, StatusReport,
    TagData,
};
use crate::transport::Transport;
use crate::types::{AcquisitionParams, ConnectionTarget, SessionStats};
use std::collections::VecDeque;
use std::sync::Arc;

/// Status shown when start is pressed with no tag names
pub const EMPTY_TAG_LIST_MESSAGE: &str = "Empty Tag List";

/// Status shown when the watchdog stops a silent stream
pub const STALE_DATA_MESSAGE: &str = "Stale Data: Reset Connection";

/// Status shown when a request gets no response in time
pub const TIMEOUT_MESSAGE: &str = "Connection to server timed out";

/// Upper bound on transport events handled per pump
const MAX_EVENTS_PER_PUMP: usize = 1_000;

/// Request awaiting its response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Connect,
    FirstRead,
}

impl RequestKind {
    /// Wire name of the request
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Connect => "connect_to_PLC",
            RequestKind::FirstRead => "first_read",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingRequest {
    kind: RequestKind,
    deadline_ms: i64,
    /// State to fall back to on failure or timeout
    return_state: SessionState,
    /// Names submitted with `first_read`
    tag_list: Vec<String>,
    params: Option<AcquisitionParams>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    User,
    Stale,
}

/// One client lifecycle from connect to reset
pub struct Session {
    transport: Box<dyn Transport>,
    sink: Box<dyn SampleSink>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    state: SessionState,
    target: Option<ConnectionTarget>,
    params: Option<AcquisitionParams>,
    editor: TagSetEditor,
    tag_set: TagSet,
    known_tags: Vec<String>,
    watchdog: Watchdog,
    pending: Option<PendingRequest>,
    status: Option<String>,
    events: VecDeque<SessionEvent>,
    stats: SessionStats,
}

impl Session {
    /// Create an idle session around its collaborators
    pub fn new(
        transport: Box<dyn Transport>,
        sink: Box<dyn SampleSink>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let watchdog = Watchdog::new(settings.watchdog.interval_ms, settings.stale_after_ms());
        Self {
            transport,
            sink,
            clock,
            settings,
            state: SessionState::Idle,
            target: None,
            params: None,
            editor: TagSetEditor::new(),
            tag_set: TagSet::default(),
            known_tags: Vec::new(),
            watchdog,
            pending: None,
            status: None,
            events: VecDeque::new(),
            stats: SessionStats::default(),
        }
    }

    /// Create a session with the sink, timings and initial tag rows from `config`
    pub fn from_config(
        config: &AppConfig,
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut session = Self::new(
            transport,
            sink_for_mode(config.acquisition.sink),
            clock,
            config.session,
        );
        session.editor = TagSetEditor::with_names(config.acquisition.tags.iter().cloned());
        session
    }

    // ==================== Accessors ====================

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current status line, if any
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    /// Whether the connection target inputs are locked
    pub fn target_locked(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Parameters of the armed (or arming) stream
    pub fn params(&self) -> Option<AcquisitionParams> {
        self.params
    }

    /// Tag names reported by the controller on connect
    pub fn known_tags(&self) -> &[String] {
        &self.known_tags
    }

    pub fn tag_editor(&self) -> &TagSetEditor {
        &self.editor
    }

    /// Descriptors of the armed tag set
    pub fn tag_set(&self) -> &TagSet {
        &self.tag_set
    }

    pub fn sink(&self) -> &dyn SampleSink {
        self.sink.as_ref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_watchdog_armed(&self) -> bool {
        self.watchdog.is_armed()
    }

    /// Request currently awaiting a response
    pub fn pending_request(&self) -> Option<RequestKind> {
        self.pending.as_ref().map(|p| p.kind)
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // ==================== Tag editing ====================

    /// Append a blank tag row
    pub fn add_tag_row(&mut self) -> Result<usize> {
        self.ensure_not_busy()?;
        self.editor.add_row()
    }

    /// Remove the last tag row
    pub fn remove_tag_row(&mut self) -> Result<()> {
        self.ensure_not_busy()?;
        self.editor.remove_last_row().map(|_| ())
    }

    /// Set the name in one tag row
    pub fn set_tag_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.ensure_not_busy()?;
        self.editor.set_name(index, name)
    }

    /// Replace every tag row
    pub fn set_tag_rows(&mut self, names: Vec<String>) -> Result<()> {
        self.ensure_not_busy()?;
        self.editor.set_rows(names)
    }

    // ==================== Commands ====================

    /// Ask the service to connect to a PLC
    pub fn connect(&mut self, target: ConnectionTarget) -> Result<()> {
        self.ensure_not_busy()?;
        if self.state != SessionState::Idle {
            return Err(self.invalid_state("connect"));
        }
        if target.host.trim().is_empty() {
            let err = PlcWatchError::Validation("PLC IP address is required".to_string());
            self.set_status(Some(err.to_string()));
            return Err(err);
        }

        self.set_status(None);
        let event = ClientEvent::ConnectToPlc((&target).into());
        if let Err(e) = self.open_and_emit(event) {
            tracing::warn!("Failed to send connect_to_PLC: {}", e);
            self.set_status(Some(e.to_string()));
            return Err(e);
        }

        tracing::info!("Connecting to PLC at {}", target);
        self.pending = Some(PendingRequest {
            kind: RequestKind::Connect,
            deadline_ms: self.deadline(self.settings.timeouts.long_ms),
            return_state: SessionState::Idle,
            tag_list: Vec::new(),
            params: None,
        });
        self.target = Some(target);
        self.transition(SessionState::Connecting);
        Ok(())
    }

    /// Arm the current tag list and start streaming once the first read succeeds
    pub fn start(&mut self, params: AcquisitionParams) -> Result<()> {
        self.ensure_not_busy()?;
        if !self.state.can_start() {
            return Err(self.invalid_state("start"));
        }
        if params.refresh_rate_ms == 0 {
            let err = PlcWatchError::Validation("Refresh rate must be greater than zero".to_string());
            self.set_status(Some(err.to_string()));
            return Err(err);
        }

        self.set_status(None);
        let names = self.editor.tag_names();
        if names.is_empty() {
            self.editor.clear_rows();
            self.set_status(Some(EMPTY_TAG_LIST_MESSAGE.to_string()));
            return Err(PlcWatchError::Validation(EMPTY_TAG_LIST_MESSAGE.to_string()));
        }
        if let Err(e) = check_unique(&names) {
            self.set_status(Some(e.to_string()));
            return Err(e);
        }

        self.editor.compact();
        self.editor.lock();

        let request = ClientEvent::FirstRead(FirstReadRequest {
            refresh_rate_ms: params.refresh_rate_ms,
            tag_list: names.clone(),
        });
        if let Err(e) = self.transport.emit(request) {
            tracing::warn!("Failed to send first_read: {}", e);
            self.editor.unlock();
            self.set_status(Some(e.to_string()));
            return Err(e);
        }

        tracing::info!(
            "Arming {} tags at {} ms refresh, {} ms window",
            names.len(),
            params.refresh_rate_ms,
            params.duration_ms
        );
        self.pending = Some(PendingRequest {
            kind: RequestKind::FirstRead,
            deadline_ms: self.deadline(self.settings.timeouts.short_ms),
            return_state: self.state,
            tag_list: names,
            params: Some(params),
        });
        self.transition(SessionState::Arming);
        Ok(())
    }

    /// Halt the stream, keeping the connection and last values
    pub fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Streaming {
            return Err(self.invalid_state("stop"));
        }
        self.enter_stopped(StopReason::User);
        Ok(())
    }

    /// Return to a fresh idle session from any state
    pub fn reset(&mut self) {
        self.watchdog.disarm();
        if self.transport.is_open() {
            if let Err(e) = self.transport.emit(ClientEvent::StopLoop) {
                tracing::debug!("stop_loop on reset not delivered: {}", e);
            }
            self.transport.close();
        }

        self.pending = None;
        self.target = None;
        self.params = None;
        self.known_tags.clear();
        self.tag_set.clear();
        self.sink.clear();
        self.editor.unlock();
        self.set_status(None);
        self.events.push_back(SessionEvent::TagsCleared);
        tracing::info!("Session reset");
        self.transition(SessionState::Idle);
    }

    /// Best-effort goodbye before the session goes away
    pub fn teardown(&mut self) {
        self.watchdog.disarm();
        self.pending = None;
        if self.transport.is_open() {
            if let Err(e) = self.transport.emit(ClientEvent::Disconnect) {
                tracing::debug!("disconnect on teardown not delivered: {}", e);
            }
            self.transport.close();
        }
        self.editor.unlock();
        self.transition(SessionState::Idle);
    }

    // ==================== Event loop ====================

    /// Handle everything the transport has delivered, then run timers
    ///
    /// Returns the number of transport events handled. A transport error
    /// stops the drain for this pump but timers still run.
    pub fn pump(&mut self) -> Result<usize> {
        let mut handled = 0;
        let mut failure = None;

        if self.transport.is_open() {
            while handled < MAX_EVENTS_PER_PUMP {
                match self.transport.poll() {
                    Ok(Some(event)) => {
                        self.handle_event(event);
                        handled += 1;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        self.tick();

        match failure {
            Some(e) => Err(e),
            None => Ok(handled),
        }
    }

    /// Apply one event from the service
    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ConnectResponse(resp) => self.on_connect_response(resp),
            ServerEvent::FirstReadResponse(resp) => self.on_first_read_response(resp),
            ServerEvent::TagData(data) => self.on_tag_data(data),
        }
    }

    /// Expire overdue requests and run the watchdog check if one is due
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();

        if self.pending.as_ref().is_some_and(|p| now >= p.deadline_ms) {
            if let Some(pending) = self.pending.take() {
                self.on_request_timeout(pending);
            }
        }

        match self.watchdog.poll(now) {
            WatchdogStatus::Stale { age_ms } => {
                tracing::warn!("No data for {} ms, stopping stream", age_ms);
                if self.state == SessionState::Streaming {
                    self.enter_stopped(StopReason::Stale);
                }
            }
            WatchdogStatus::Healthy { age_ms } => {
                tracing::trace!("Watchdog check, last sample {} ms ago", age_ms);
            }
            WatchdogStatus::NotDue | WatchdogStatus::Disarmed => {}
        }
    }

    // ==================== Responses ====================

    fn on_connect_response(&mut self, resp: ConnectResponse) {
        let Some(pending) = self.take_pending(RequestKind::Connect, "connect_response") else {
            return;
        };

        if resp.is_success() {
            tracing::info!(
                "Connected, controller exposes {} tags",
                resp.base_tag_list.len()
            );
            self.known_tags = resp.base_tag_list;
            self.events
                .push_back(SessionEvent::KnownTags(self.known_tags.clone()));
            self.transition(SessionState::Connected);
        } else {
            tracing::warn!("Connect failed: {}", resp.message());
            self.set_status(Some(failure_message(&resp, "Connection failed")));
            self.target = None;
            self.transition(pending.return_state);
        }
    }

    fn on_first_read_response(&mut self, resp: FirstReadResponse) {
        let Some(pending) = self.take_pending(RequestKind::FirstRead, "first_read_response") else {
            return;
        };

        if !resp.is_success() {
            tracing::warn!("First read failed: {}", resp.message());
            self.set_status(Some(failure_message(&resp, "First read failed")));
            self.editor.unlock();
            self.transition(pending.return_state);
            return;
        }

        let mut tag_set = TagSet::from_names(&pending.tag_list);
        let covered = tag_set.apply_first_read(&resp.values, &resp.data_types);
        if covered < tag_set.len() {
            tracing::warn!(
                "first_read_response covered {} of {} tags ({} values, {} types)",
                covered,
                tag_set.len(),
                resp.values.len(),
                resp.data_types.len()
            );
        }

        let params = pending.params.unwrap_or(AcquisitionParams::new(
            crate::config::DEFAULT_REFRESH_RATE_MS,
            crate::config::DEFAULT_DURATION_MS,
        ));
        let capacity = trend_capacity(params.duration_ms, params.refresh_rate_ms);
        self.sink.reset(&pending.tag_list, capacity);
        self.params = Some(params);
        self.tag_set = tag_set;
        self.events.push_back(SessionEvent::TagsArmed(
            self.tag_set.descriptors().to_vec(),
        ));

        if let Err(e) = self.transport.emit(ClientEvent::StartLoop) {
            // The watchdog stops the session if the loop never starts
            tracing::warn!("Failed to send start_loop: {}", e);
        }
        if !self.watchdog.arm(self.clock.now_ms()) {
            tracing::debug!("Watchdog already armed");
        }
        tracing::info!(
            "Streaming {} tags, trend capacity {}",
            self.tag_set.len(),
            capacity
        );
        self.transition(SessionState::Streaming);
    }

    fn on_tag_data(&mut self, data: TagData) {
        if self.state != SessionState::Streaming {
            self.stats.ignored_events += 1;
            tracing::debug!("Ignoring tagData while {}", self.state);
            return;
        }

        if !data.is_success() {
            self.stats.failed_samples += 1;
            tracing::debug!("Failed sample: {}", data.message());
            if self.status.is_none() {
                self.set_status(Some(failure_message(&data, "Read failed")));
            }
            return;
        }

        let fed_at = match self.settings.watchdog.clock {
            StalenessClock::Local => self.clock.now_ms(),
            StalenessClock::Server => data.timestamp_ms,
        };
        self.watchdog.feed(fed_at);

        if data.values.len() != self.tag_set.len() {
            tracing::debug!(
                "tagData carried {} values for {} tags",
                data.values.len(),
                self.tag_set.len()
            );
        }
        self.tag_set.apply_values(&data.values);
        let evicted = self.sink.push(data.timestamp_ms, &data.values);

        self.stats.samples_applied += 1;
        self.stats.evictions += evicted as u64;
        self.events.push_back(SessionEvent::Sample {
            timestamp_ms: data.timestamp_ms,
            values: data.values,
        });
    }

    fn on_request_timeout(&mut self, pending: PendingRequest) {
        tracing::warn!("{} timed out", pending.kind.name());
        self.stats.requests_timed_out += 1;
        self.set_status(Some(TIMEOUT_MESSAGE.to_string()));
        match pending.kind {
            RequestKind::Connect => self.target = None,
            RequestKind::FirstRead => self.editor.unlock(),
        }
        self.transition(pending.return_state);
    }

    // ==================== Helpers ====================

    fn enter_stopped(&mut self, reason: StopReason) {
        self.watchdog.disarm();
        if let Err(e) = self.transport.emit(ClientEvent::StopLoop) {
            tracing::warn!("Failed to send stop_loop: {}", e);
        }
        self.editor.unlock();
        match reason {
            StopReason::User => self.set_status(None),
            StopReason::Stale => {
                self.stats.stale_stops += 1;
                self.set_status(Some(STALE_DATA_MESSAGE.to_string()));
            }
        }
        self.transition(SessionState::Stopped);
    }

    fn take_pending(&mut self, kind: RequestKind, event: &str) -> Option<PendingRequest> {
        if self.pending.as_ref().is_some_and(|p| p.kind == kind) {
            return self.pending.take();
        }
        self.stats.ignored_events += 1;
        tracing::debug!("Ignoring unexpected {} while {}", event, self.state);
        None
    }

    fn open_and_emit(&mut self, event: ClientEvent) -> Result<()> {
        if !self.transport.is_open() {
            self.transport.open()?;
        }
        self.transport.emit(event)
    }

    fn ensure_not_busy(&self) -> Result<()> {
        match &self.pending {
            Some(pending) => Err(PlcWatchError::Busy(pending.kind.name().to_string())),
            None => Ok(()),
        }
    }

    fn invalid_state(&self, action: &str) -> PlcWatchError {
        PlcWatchError::InvalidState {
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }

    fn deadline(&self, budget_ms: u64) -> i64 {
        let budget_ms = i64::try_from(budget_ms).unwrap_or(i64::MAX);
        self.clock.now_ms().saturating_add(budget_ms)
    }

    fn set_status(&mut self, status: Option<String>) {
        if self.status != status {
            self.status = status.clone();
            self.events.push_back(SessionEvent::Status(status));
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        tracing::debug!("Session {} -> {}", from, to);
        self.state = to;
        self.events.push_back(SessionEvent::StateChanged { from, to });
    }
}

fn failure_message(report: &impl StatusReport, fallback: &str) -> String {
    if report.message().is_empty() {
        fallback.to_string()
    } else {
        report.message().to_string()
    }
}
