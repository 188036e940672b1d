//! Test data builders for creating test sessions

use super::{reply, T0};
use plcwatch_rs::clock::ManualClock;
use plcwatch_rs::config::{SessionSettings, SinkMode, StalenessClock};
use plcwatch_rs::protocol::{ConnectResponse, FirstReadResponse, ServerEvent};
use plcwatch_rs::session::{sink_for_mode, Session, SessionState};
use plcwatch_rs::transport::{channel_pair, ServiceEndpoint};
use plcwatch_rs::{AcquisitionParams, ConnectionTarget, TagValue};
use std::sync::Arc;

/// Builder for a session wired to an in-process service endpoint
pub struct SessionBuilder {
    tags: Vec<String>,
    sink: SinkMode,
    settings: SessionSettings,
    start_ms: i64,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            tags: Vec::new(),
            sink: SinkMode::Trend,
            settings: SessionSettings::default(),
            start_ms: T0,
        }
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn sink(mut self, sink: SinkMode) -> Self {
        self.sink = sink;
        self
    }

    pub fn staleness(mut self, interval_ms: u64, threshold_ms: u64) -> Self {
        self.settings.watchdog.interval_ms = interval_ms;
        self.settings.timeouts.medium_ms = threshold_ms;
        self
    }

    pub fn server_clock(mut self) -> Self {
        self.settings.watchdog.clock = StalenessClock::Server;
        self
    }

    pub fn build(self) -> TestRig {
        let (transport, endpoint) = channel_pair();
        let clock = ManualClock::new(self.start_ms);
        let mut session = Session::new(
            Box::new(transport),
            sink_for_mode(self.sink),
            Arc::new(clock.clone()),
            self.settings,
        );
        if !self.tags.is_empty() {
            session
                .set_tag_rows(self.tags)
                .expect("fresh session accepts tag rows");
        }
        TestRig {
            session,
            endpoint,
            clock,
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A session, the service end of its transport, and its clock
pub struct TestRig {
    pub session: Session,
    pub endpoint: ServiceEndpoint,
    pub clock: ManualClock,
}

impl TestRig {
    pub fn target() -> ConnectionTarget {
        ConnectionTarget::new("192.168.1.10", "0")
    }

    /// Connect and answer with a successful `connect_response`
    pub fn connected(mut self, known: &[&str]) -> Self {
        self.session.connect(Self::target()).expect("connect accepted");
        reply(
            &self.endpoint,
            ServerEvent::ConnectResponse(ConnectResponse::success(
                known.iter().map(|t| t.to_string()).collect(),
            )),
        );
        self.session.pump().expect("pump after connect_response");
        assert_eq!(self.session.state(), SessionState::Connected);
        self.endpoint.drain();
        self
    }

    /// Arm the current tag rows and answer `first_read` with `values`
    pub fn streaming(mut self, params: AcquisitionParams, values: Vec<TagValue>) -> Self {
        self.session.start(params).expect("start accepted");
        let types = values.iter().map(|_| Some("DINT".to_string())).collect();
        reply(
            &self.endpoint,
            ServerEvent::FirstReadResponse(FirstReadResponse::success(values, types)),
        );
        self.session.pump().expect("pump after first_read_response");
        assert_eq!(self.session.state(), SessionState::Streaming);
        self.endpoint.drain();
        self.session.drain_events();
        self
    }

    /// Advance the clock, push one sample stamped with the new time, and pump
    pub fn sample(&mut self, advance_ms: i64, values: Vec<TagValue>) {
        use plcwatch_rs::clock::Clock;
        use plcwatch_rs::protocol::TagData;

        self.clock.advance(advance_ms);
        reply(
            &self.endpoint,
            ServerEvent::TagData(TagData::success(self.clock.now_ms(), values)),
        );
        self.session.pump().expect("pump after tagData");
    }

    /// Advance the clock and pump with no service traffic
    pub fn idle(&mut self, advance_ms: i64) {
        self.clock.advance(advance_ms);
        self.session.pump().expect("idle pump");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_builder() {
        let rig = SessionBuilder::new().tags(&["A", "B"]).build();
        assert_eq!(rig.session.state(), SessionState::Idle);
        assert_eq!(rig.session.tag_editor().row_count(), 2);
    }
}
