//! Simulated acquisition service
//!
//! This module provides a stand-in for the acquisition service so the client
//! can be exercised without a PLC. It sits on the [`ServiceEndpoint`] side of
//! an in-process channel pair and answers the event vocabulary the way the
//! real service does.
//!
//! # Behavior
//!
//! - `connect_to_PLC` succeeds (unless configured to fail) and reports every
//!   simulated tag name as `BaseTagList`
//! - `first_read` fails with `Tag not found: <name>` for the first unknown tag,
//!   otherwise returns one value and data type per requested tag, in order
//! - `start_loop` starts emitting `tagData` at the requested refresh rate
//! - `stop_loop` and `disconnect` stop the loop
//!
//! A shared stall flag suppresses `tagData` while set, which is how tests
//! provoke the client's staleness watchdog.
//!
//! # Data Patterns
//!
//! Each tag generates values from a [`MockDataPattern`]:
//!
//! - [`MockDataPattern::Constant`] - Fixed value
//! - [`MockDataPattern::Sine`] - Sinusoidal wave with configurable frequency/amplitude
//! - [`MockDataPattern::Counter`] - Incrementing counter with wrap-around
//! - [`MockDataPattern::Random`] - Random values within a range
//! - [`MockDataPattern::Sawtooth`] - Linear ramp that resets periodically
//! - [`MockDataPattern::Square`] - Square wave alternating between two values
//!
//! The tag's PLC data type decides how the generated number is reported:
//! `BOOL` as a boolean, integer types rounded, anything else as a real.
//!
//! # Example
//!
//! ```ignore
//! use plcwatch_rs::transport::{channel_pair, MockDataPattern, SimulatedService};
//!
//! let (transport, endpoint) = channel_pair();
//! let service = SimulatedService::new(endpoint)
//!     .with_tag("Motor_Speed", "REAL", MockDataPattern::Sine {
//!         frequency: 0.2,
//!         amplitude: 50.0,
//!         offset: 1500.0,
//!     });
//! let handle = service.spawn();
//! // ... drive a session over `transport` ...
//! handle.shutdown();
//! ```

use super::ServiceEndpoint;
use crate::error::Result;
use crate::protocol::{
    ClientEvent, ConnectRequest, ConnectResponse, FirstReadRequest, FirstReadResponse,
    ServerEvent, TagData,
};
use crate::types::TagValue;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Pattern for generating simulated tag values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockDataPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments
    Counter { step: f64, min: f64, max: f64 },
    /// Random values within range
    Random { min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
}

impl Default for MockDataPattern {
    fn default() -> Self {
        MockDataPattern::Sine {
            frequency: 1.0,
            amplitude: 100.0,
            offset: 0.0,
        }
    }
}

/// One simulated controller tag
#[derive(Debug, Clone)]
pub struct SimulatedTag {
    /// PLC data type label reported in `DataTypes`
    pub data_type: String,
    /// Data generation pattern
    pub pattern: MockDataPattern,
    /// Current counter value (for Counter pattern)
    counter_value: f64,
}

impl SimulatedTag {
    pub fn new(data_type: impl Into<String>, pattern: MockDataPattern) -> Self {
        Self {
            data_type: data_type.into(),
            pattern,
            counter_value: 0.0,
        }
    }

    /// Generate a raw number based on the pattern and elapsed time
    pub fn generate_value(&mut self, elapsed_secs: f64) -> f64 {
        match self.pattern {
            MockDataPattern::Constant(v) => v,
            MockDataPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            MockDataPattern::Counter { step, min, max } => {
                self.counter_value += step;
                if self.counter_value > max {
                    self.counter_value = min;
                } else if self.counter_value < min {
                    self.counter_value = max;
                }
                self.counter_value
            }
            MockDataPattern::Random { min, max } => min + rand_simple() * (max - min),
            MockDataPattern::Sawtooth { period, amplitude } => {
                let t = elapsed_secs % period;
                amplitude * (t / period)
            }
            MockDataPattern::Square { period, amplitude } => {
                let t = elapsed_secs % period;
                if t < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
        }
    }

    /// Generate a value typed after the tag's data type
    pub fn sample(&mut self, elapsed_secs: f64) -> TagValue {
        let raw = self.generate_value(elapsed_secs);
        match self.data_type.to_ascii_uppercase().as_str() {
            "BOOL" => TagValue::Bool(raw > 0.0),
            "SINT" | "INT" | "DINT" | "LINT" | "USINT" | "UINT" | "UDINT" | "ULINT" => {
                TagValue::Integer(raw.round() as i64)
            }
            _ => TagValue::Float(raw),
        }
    }
}

/// Simple pseudo-random number generator (no external dependency)
fn rand_simple() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static SEED: Cell<u64> = const { Cell::new(12345) };
    }
    SEED.with(|seed| {
        let mut s = seed.get();
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        seed.set(s);
        (s as f64) / (u64::MAX as f64)
    })
}

/// Acquisition service simulator
pub struct SimulatedService {
    endpoint: ServiceEndpoint,
    tags: BTreeMap<String, SimulatedTag>,
    connect_failure: Option<String>,
    connected: bool,
    looping: bool,
    tag_list: Vec<String>,
    refresh_rate: Duration,
    next_emit_at: Instant,
    started_at: Instant,
    stalled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl SimulatedService {
    /// Create a simulator with no tags
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        let now = Instant::now();
        Self {
            endpoint,
            tags: BTreeMap::new(),
            connect_failure: None,
            connected: false,
            looping: false,
            tag_list: Vec::new(),
            refresh_rate: Duration::from_millis(1_000),
            next_emit_at: now,
            started_at: now,
            stalled: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Add a simulated tag
    pub fn with_tag(
        mut self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        pattern: MockDataPattern,
    ) -> Self {
        self.tags
            .insert(name.into(), SimulatedTag::new(data_type, pattern));
        self
    }

    /// A small plant: a motor, a tank and a few status bits
    pub fn with_demo_tags(self) -> Self {
        self.with_tag(
            "Motor_Speed",
            "REAL",
            MockDataPattern::Sine {
                frequency: 0.1,
                amplitude: 150.0,
                offset: 1450.0,
            },
        )
        .with_tag(
            "Tank_Level",
            "REAL",
            MockDataPattern::Sawtooth {
                period: 30.0,
                amplitude: 100.0,
            },
        )
        .with_tag(
            "Batch_Count",
            "DINT",
            MockDataPattern::Counter {
                step: 1.0,
                min: 0.0,
                max: 9_999.0,
            },
        )
        .with_tag(
            "Pump_Running",
            "BOOL",
            MockDataPattern::Square {
                period: 20.0,
                amplitude: 1.0,
            },
        )
        .with_tag(
            "Line_Pressure",
            "REAL",
            MockDataPattern::Random { min: 4.8, max: 5.2 },
        )
    }

    /// Answer every `connect_to_PLC` with a failure carrying `message`
    pub fn failing_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_failure = Some(message.into());
        self
    }

    /// Flag that suppresses `tagData` while set
    pub fn stall_handle(&self) -> Arc<AtomicBool> {
        self.stalled.clone()
    }

    /// Flag that ends [`SimulatedService::run`] when cleared
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Tag names the simulated controller exposes
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Handle pending client events and emit a sample if one is due
    ///
    /// Returns `false` once the client side has gone away.
    pub fn step(&mut self, now: Instant) -> bool {
        loop {
            match self.endpoint.try_recv() {
                Ok(Some(event)) => self.handle_event(event, now),
                Ok(None) => break,
                Err(_) => return false,
            }
        }

        if self.looping && now >= self.next_emit_at {
            if !self.stalled.load(Ordering::SeqCst) {
                let data = self.read_loop_sample(now);
                if let Err(e) = self.endpoint.send(ServerEvent::TagData(data)) {
                    tracing::warn!("Simulated service could not push tagData: {}", e);
                }
            }
            // Skip missed periods instead of bursting
            while self.next_emit_at <= now {
                self.next_emit_at += self.refresh_rate;
            }
        }
        true
    }

    /// Serve until stopped or the client goes away
    pub fn run(&mut self) {
        tracing::info!("Simulated acquisition service started");
        while self.running.load(Ordering::SeqCst) {
            if !self.step(Instant::now()) {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        tracing::info!("Simulated acquisition service stopped");
    }

    /// Run on a background thread
    pub fn spawn(mut self) -> SimulatedServiceHandle {
        let running = self.stop_handle();
        let stalled = self.stall_handle();
        let thread = std::thread::spawn(move || self.run());
        SimulatedServiceHandle {
            running,
            stalled,
            thread: Some(thread),
        }
    }

    fn handle_event(&mut self, event: ClientEvent, now: Instant) {
        tracing::debug!("Simulated service received {}", event.name());
        let reply = match event {
            ClientEvent::ConnectToPlc(request) => {
                Some(ServerEvent::ConnectResponse(self.connect(&request)))
            }
            ClientEvent::FirstRead(request) => {
                Some(ServerEvent::FirstReadResponse(self.first_read(request, now)))
            }
            ClientEvent::StartLoop => {
                if self.connected && !self.tag_list.is_empty() {
                    self.looping = true;
                    self.next_emit_at = now;
                }
                None
            }
            ClientEvent::StopLoop => {
                self.looping = false;
                None
            }
            ClientEvent::Disconnect => {
                self.looping = false;
                self.connected = false;
                None
            }
        };

        if let Some(reply) = reply {
            if let Err(e) = self.endpoint.send(reply) {
                tracing::warn!("Simulated service could not reply: {}", e);
            }
        }
    }

    fn connect(&mut self, request: &ConnectRequest) -> ConnectResponse {
        if let Some(message) = &self.connect_failure {
            return ConnectResponse::failure(message.clone());
        }
        if request.ip.trim().is_empty() {
            return ConnectResponse::failure("Invalid IP address");
        }
        self.connected = true;
        ConnectResponse::success(self.tag_names())
    }

    fn first_read(&mut self, request: FirstReadRequest, now: Instant) -> FirstReadResponse {
        if !self.connected {
            return FirstReadResponse::failure("Not connected to PLC");
        }
        if let Some(unknown) = request
            .tag_list
            .iter()
            .find(|name| !self.tags.contains_key(name.as_str()))
        {
            return FirstReadResponse::failure(format!("Tag not found: {}", unknown));
        }

        self.looping = false;
        self.refresh_rate = Duration::from_millis(request.refresh_rate_ms.max(1));
        self.tag_list = request.tag_list;

        let elapsed = now.duration_since(self.started_at).as_secs_f64();
        let mut values = Vec::with_capacity(self.tag_list.len());
        let mut data_types = Vec::with_capacity(self.tag_list.len());
        for name in &self.tag_list {
            if let Some(tag) = self.tags.get_mut(name) {
                values.push(tag.sample(elapsed));
                data_types.push(Some(tag.data_type.clone()));
            }
        }
        FirstReadResponse::success(values, data_types)
    }

    fn read_loop_sample(&mut self, now: Instant) -> TagData {
        let elapsed = now.duration_since(self.started_at).as_secs_f64();
        let values = self
            .tag_list
            .iter()
            .map(|name| {
                self.tags
                    .get_mut(name)
                    .map(|tag| tag.sample(elapsed))
                    .unwrap_or_default()
            })
            .collect();
        TagData::success(chrono::Utc::now().timestamp_millis(), values)
    }
}

/// Handle to a simulator running on its own thread
pub struct SimulatedServiceHandle {
    running: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SimulatedServiceHandle {
    /// Stop or resume pushing `tagData`
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Stop the simulator and wait for its thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| {
                crate::error::PlcWatchError::Channel("Simulated service thread panicked".to_string())
            })?;
        }
        Ok(())
    }
}

impl Drop for SimulatedServiceHandle {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}
