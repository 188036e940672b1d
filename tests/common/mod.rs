//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use plcwatch_rs::protocol::{ClientEvent, ServerEvent};
use plcwatch_rs::transport::ServiceEndpoint;
use plcwatch_rs::{SessionHandle, WorkerMessage};
use std::time::{Duration, Instant};

/// Fixed start time for manual clocks
pub const T0: i64 = 1_700_000_000_000;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Push one event from the service side
pub fn reply(endpoint: &ServiceEndpoint, event: ServerEvent) {
    endpoint
        .send(event)
        .expect("client side of the channel pair is gone");
}

/// Names of every client event the service has received so far
pub fn sent_names(endpoint: &ServiceEndpoint) -> Vec<&'static str> {
    endpoint.drain().iter().map(ClientEvent::name).collect()
}

/// Read worker messages until `pred` matches or `timeout` passes
///
/// Returns every message read, including the matching one, or `None` on
/// timeout.
pub fn wait_for<F>(handle: &SessionHandle, timeout: Duration, mut pred: F) -> Option<Vec<WorkerMessage>>
where
    F: FnMut(&WorkerMessage) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Some(msg) = handle.recv_timeout(remaining.min(Duration::from_millis(50))) {
            let done = pred(&msg);
            seen.push(msg);
            if done {
                return Some(seen);
            }
        }
    }
    None
}
