//! Integration tests for the session lifecycle
//!
//! These tests drive a [`Session`] over an in-process channel pair with a
//! manual clock, playing the acquisition service by hand:
//! - Connect, arm, stream and stop
//! - Request failures and timeouts
//! - Positional value mapping
//! - Trend window and latest-value sinks
//! - Reset and reconnect

mod common;

use common::builders::{SessionBuilder, TestRig};
use common::{reply, sent_names};
use plcwatch_rs::clock::Clock;
use plcwatch_rs::config::SinkMode;
use plcwatch_rs::protocol::{
    ClientEvent, ConnectRequest, ConnectResponse, FirstReadRequest, FirstReadResponse,
    ServerEvent, TagData,
};
use plcwatch_rs::session::{
    SampleSink, SessionEvent, SessionState, EMPTY_TAG_LIST_MESSAGE, STALE_DATA_MESSAGE,
    TIMEOUT_MESSAGE,
};
use plcwatch_rs::{AcquisitionParams, PlcWatchError, TagValue};

fn ints(values: &[i64]) -> Vec<TagValue> {
    values.iter().copied().map(TagValue::Integer).collect()
}

fn state_changes(events: &[SessionEvent]) -> Vec<(SessionState, SessionState)> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_connect_arm_stream_stop() {
    let mut rig = SessionBuilder::new()
        .tags(&["Motor_Speed", "Tank_Level"])
        .build();

    rig.session.connect(TestRig::target()).unwrap();
    assert_eq!(
        rig.endpoint.drain(),
        vec![ClientEvent::ConnectToPlc(ConnectRequest {
            ip: "192.168.1.10".to_string(),
            slot: "0".to_string(),
        })]
    );

    reply(
        &rig.endpoint,
        ServerEvent::ConnectResponse(ConnectResponse::success(vec![
            "Motor_Speed".to_string(),
            "Tank_Level".to_string(),
            "Spare".to_string(),
        ])),
    );
    assert_eq!(rig.session.pump().unwrap(), 1);
    assert_eq!(rig.session.state(), SessionState::Connected);
    assert_eq!(rig.session.known_tags().len(), 3);

    rig.session
        .start(AcquisitionParams::new(1_000, 10_000))
        .unwrap();
    assert_eq!(
        rig.endpoint.drain(),
        vec![ClientEvent::FirstRead(FirstReadRequest {
            refresh_rate_ms: 1_000,
            tag_list: vec!["Motor_Speed".to_string(), "Tank_Level".to_string()],
        })]
    );
    assert!(rig.session.tag_editor().is_locked());

    reply(
        &rig.endpoint,
        ServerEvent::FirstReadResponse(FirstReadResponse::success(
            vec![TagValue::Float(1450.0), TagValue::Float(42.5)],
            vec![Some("REAL".to_string()), Some("REAL".to_string())],
        )),
    );
    rig.session.pump().unwrap();
    assert_eq!(rig.session.state(), SessionState::Streaming);
    assert_eq!(sent_names(&rig.endpoint), vec!["start_loop"]);
    assert_eq!(rig.session.sink().capacity(), 10);

    for i in 0..3 {
        rig.sample(1_000, vec![TagValue::Float(1450.0 + i as f64), TagValue::Float(42.5)]);
    }
    assert_eq!(rig.session.sink().len(), 3);
    assert_eq!(rig.session.stats().samples_applied, 3);
    assert_eq!(
        rig.session.tag_set().by_name("Motor_Speed").unwrap().value,
        TagValue::Float(1452.0)
    );

    rig.session.stop().unwrap();
    assert_eq!(sent_names(&rig.endpoint), vec!["stop_loop"]);
    assert_eq!(rig.session.state(), SessionState::Stopped);
    // Values survive a stop
    assert_eq!(rig.session.sink().len(), 3);
    assert!(!rig.session.tag_editor().is_locked());

    assert_eq!(
        state_changes(&rig.session.drain_events()),
        vec![
            (SessionState::Idle, SessionState::Connecting),
            (SessionState::Connecting, SessionState::Connected),
            (SessionState::Connected, SessionState::Arming),
            (SessionState::Arming, SessionState::Streaming),
            (SessionState::Streaming, SessionState::Stopped),
        ]
    );
}

#[test]
fn test_unknown_tag_fails_first_read() {
    let mut rig = SessionBuilder::new()
        .tags(&["Motor_Speed", "No_Such_Tag"])
        .build()
        .connected(&["Motor_Speed"]);

    rig.session
        .start(AcquisitionParams::new(1_000, 10_000))
        .unwrap();
    rig.endpoint.drain();
    reply(
        &rig.endpoint,
        ServerEvent::FirstReadResponse(FirstReadResponse::failure("Tag not found: No_Such_Tag")),
    );
    rig.session.pump().unwrap();

    assert_eq!(rig.session.state(), SessionState::Connected);
    assert_eq!(rig.session.status(), Some("Tag not found: No_Such_Tag"));
    assert!(!rig.session.tag_editor().is_locked());
    assert!(!rig.session.is_watchdog_armed());
    // No loop is started for a failed arm
    assert!(rig.endpoint.drain().is_empty());
}

#[test]
fn test_values_map_by_position() {
    let mut rig = SessionBuilder::new()
        .tags(&["B", "A"])
        .build()
        .connected(&["A", "B"])
        .streaming(AcquisitionParams::new(500, 5_000), ints(&[2, 1]));

    let first = rig.session.tag_set().get(0).unwrap();
    assert_eq!(first.name, "B");
    assert_eq!(first.value, TagValue::Integer(2));
    assert_eq!(first.data_type.as_deref(), Some("DINT"));

    rig.sample(500, ints(&[20, 10]));
    assert_eq!(rig.session.tag_set().by_name("A").unwrap().value, TagValue::Integer(10));
    assert_eq!(rig.session.tag_set().by_name("B").unwrap().value, TagValue::Integer(20));

    let trend = rig.session.sink().as_trend().unwrap();
    assert_eq!(trend.series_at(0).unwrap().name, "B");
    assert_eq!(
        trend.series_named("A").unwrap().values.back(),
        Some(&TagValue::Integer(10))
    );
}

#[test]
fn test_short_first_read_leaves_missing_values_empty() {
    let rig = SessionBuilder::new()
        .tags(&["A", "B", "C"])
        .build()
        .connected(&[])
        .streaming(AcquisitionParams::new(1_000, 10_000), ints(&[7]));

    assert_eq!(rig.session.tag_set().len(), 3);
    assert_eq!(rig.session.tag_set().get(0).unwrap().value, TagValue::Integer(7));
    assert!(rig.session.tag_set().get(2).unwrap().value.is_null());
}

#[test]
fn test_empty_tag_list_sends_nothing() {
    let mut rig = SessionBuilder::new().tags(&["", "   "]).build().connected(&[]);

    let err = rig
        .session
        .start(AcquisitionParams::new(1_000, 10_000))
        .unwrap_err();
    assert!(matches!(err, PlcWatchError::Validation(_)));
    assert_eq!(rig.session.status(), Some(EMPTY_TAG_LIST_MESSAGE));
    assert_eq!(rig.session.state(), SessionState::Connected);
    assert!(rig.endpoint.drain().is_empty());
}

#[test]
fn test_trend_window_evicts_oldest() {
    let mut rig = SessionBuilder::new()
        .tags(&["A"])
        .build()
        .connected(&["A"])
        .streaming(AcquisitionParams::new(1_000, 3_000), ints(&[0]));

    for v in 1..=5 {
        rig.sample(1_000, ints(&[v]));
    }

    let trend = rig.session.sink().as_trend().unwrap();
    assert_eq!(trend.labels().len(), 3);
    assert_eq!(rig.session.stats().evictions, 2);
    let kept: Vec<_> = trend.series_at(0).unwrap().values.iter().cloned().collect();
    assert_eq!(kept, ints(&[3, 4, 5]));
    assert_eq!(trend.labels().back().copied(), Some(rig.clock.now_ms()));
}

#[test]
fn test_latest_only_sink_keeps_one_sample() {
    let mut rig = SessionBuilder::new()
        .tags(&["A", "B"])
        .sink(SinkMode::LatestOnly)
        .build()
        .connected(&["A", "B"])
        .streaming(AcquisitionParams::new(1_000, 60_000), ints(&[0, 0]));

    rig.sample(1_000, ints(&[1, 2]));
    rig.sample(1_000, ints(&[3, 4]));

    assert_eq!(rig.session.sink().len(), 1);
    assert!(rig.session.sink().as_trend().is_none());
    let (ts, values) = rig.session.sink().latest().unwrap();
    assert_eq!(ts, rig.clock.now_ms());
    assert_eq!(values, ints(&[3, 4]));
}

#[test]
fn test_failed_samples_do_not_count_as_live() {
    let mut rig = SessionBuilder::new()
        .tags(&["A"])
        .build()
        .connected(&["A"])
        .streaming(AcquisitionParams::new(1_000, 10_000), ints(&[0]));

    for _ in 0..12 {
        rig.clock.advance(1_000);
        let now = rig.clock.now_ms();
        reply(&rig.endpoint, ServerEvent::TagData(TagData::failure(now, "Read timeout")));
        rig.session.pump().unwrap();
    }

    assert_eq!(rig.session.state(), SessionState::Stopped);
    assert_eq!(rig.session.status(), Some(STALE_DATA_MESSAGE));
    assert_eq!(rig.session.stats().failed_samples, 11);
    assert!(rig.session.sink().is_empty());
}

#[test]
fn test_connect_failure_returns_to_idle() {
    let mut rig = SessionBuilder::new().build();

    rig.session.connect(TestRig::target()).unwrap();
    reply(
        &rig.endpoint,
        ServerEvent::ConnectResponse(ConnectResponse::failure("PLC unreachable")),
    );
    rig.session.pump().unwrap();

    assert_eq!(rig.session.state(), SessionState::Idle);
    assert_eq!(rig.session.status(), Some("PLC unreachable"));
    assert!(rig.session.target().is_none());
    assert!(!rig.session.target_locked());
}

#[test]
fn test_connect_timeout_and_late_response() {
    let mut rig = SessionBuilder::new().build();

    rig.session.connect(TestRig::target()).unwrap();
    rig.idle(59_999);
    assert_eq!(rig.session.state(), SessionState::Connecting);

    rig.idle(1);
    assert_eq!(rig.session.state(), SessionState::Idle);
    assert_eq!(rig.session.status(), Some(TIMEOUT_MESSAGE));
    assert_eq!(rig.session.stats().requests_timed_out, 1);

    reply(
        &rig.endpoint,
        ServerEvent::ConnectResponse(ConnectResponse::success(vec![])),
    );
    rig.session.pump().unwrap();
    assert_eq!(rig.session.state(), SessionState::Idle);
    assert_eq!(rig.session.stats().ignored_events, 1);
}

#[test]
fn test_commands_refused_while_request_in_flight() {
    let mut rig = SessionBuilder::new().tags(&["A"]).build();

    rig.session.connect(TestRig::target()).unwrap();
    assert!(matches!(
        rig.session.connect(TestRig::target()),
        Err(PlcWatchError::Busy(_))
    ));
    assert!(matches!(
        rig.session.set_tag_name(0, "B"),
        Err(PlcWatchError::Busy(_))
    ));
    assert_eq!(rig.session.tag_editor().rows(), &["A".to_string()]);
}

#[test]
fn test_restart_after_stop_rearms() {
    let mut rig = SessionBuilder::new()
        .tags(&["A"])
        .build()
        .connected(&["A", "B"])
        .streaming(AcquisitionParams::new(1_000, 10_000), ints(&[1]));

    rig.sample(1_000, ints(&[2]));
    rig.session.stop().unwrap();
    rig.endpoint.drain();

    rig.session
        .set_tag_rows(vec!["A".to_string(), "B".to_string()])
        .unwrap();
    rig.session
        .start(AcquisitionParams::new(2_000, 10_000))
        .unwrap();
    reply(
        &rig.endpoint,
        ServerEvent::FirstReadResponse(FirstReadResponse::success(ints(&[5, 6]), vec![None, None])),
    );
    rig.session.pump().unwrap();

    assert_eq!(rig.session.state(), SessionState::Streaming);
    assert_eq!(rig.session.tag_set().len(), 2);
    // Re-arming starts a fresh window
    assert!(rig.session.sink().is_empty());
    assert_eq!(rig.session.sink().capacity(), 5);
    assert_eq!(
        sent_names(&rig.endpoint),
        vec!["first_read", "start_loop"]
    );
}

#[test]
fn test_reset_clears_and_reconnects_cleanly() {
    let mut rig = SessionBuilder::new()
        .tags(&["A"])
        .build()
        .connected(&["A"])
        .streaming(AcquisitionParams::new(1_000, 10_000), ints(&[1]));

    rig.sample(1_000, ints(&[2]));
    rig.session.reset();

    assert_eq!(sent_names(&rig.endpoint), vec!["stop_loop"]);
    assert_eq!(rig.session.state(), SessionState::Idle);
    assert!(rig.session.tag_set().is_empty());
    assert!(rig.session.sink().is_empty());
    assert!(rig
        .session
        .drain_events()
        .contains(&SessionEvent::TagsCleared));

    // Leftovers from the old connection are dropped on reconnect
    reply(
        &rig.endpoint,
        ServerEvent::TagData(TagData::success(rig.clock.now_ms(), ints(&[3]))),
    );
    rig.session.connect(TestRig::target()).unwrap();
    reply(
        &rig.endpoint,
        ServerEvent::ConnectResponse(ConnectResponse::success(vec!["A".to_string()])),
    );
    assert_eq!(rig.session.pump().unwrap(), 1);
    assert_eq!(rig.session.state(), SessionState::Connected);
    assert_eq!(rig.session.stats().ignored_events, 0);
}

#[test]
fn test_reset_while_arming_clears_pending_request() {
    let mut rig = SessionBuilder::new().tags(&["A"]).build().connected(&["A"]);

    rig.session
        .start(AcquisitionParams::new(1_000, 10_000))
        .unwrap();
    assert_eq!(rig.session.state(), SessionState::Arming);
    assert!(rig.session.tag_editor().is_locked());
    assert_eq!(sent_names(&rig.endpoint), vec!["first_read"]);

    rig.session.reset();

    assert_eq!(rig.session.state(), SessionState::Idle);
    assert!(rig.session.pending_request().is_none());
    assert!(!rig.session.tag_editor().is_locked());
    assert_eq!(sent_names(&rig.endpoint), vec!["stop_loop"]);

    // The answer to the abandoned first_read arrives after the reset
    reply(
        &rig.endpoint,
        ServerEvent::FirstReadResponse(FirstReadResponse::success(
            ints(&[1]),
            vec![Some("DINT".to_string())],
        )),
    );
    rig.session.connect(TestRig::target()).unwrap();
    reply(
        &rig.endpoint,
        ServerEvent::ConnectResponse(ConnectResponse::success(vec!["A".to_string()])),
    );
    assert_eq!(rig.session.pump().unwrap(), 1);
    assert_eq!(rig.session.state(), SessionState::Connected);
    assert_eq!(rig.session.stats().ignored_events, 0);
    assert!(rig.session.tag_set().is_empty());
}
