//! Core data types for PlcWatch-RS
//!
//! This module contains the fundamental data structures used throughout
//! the client for representing tags, their values, and session statistics.
//!
//! # Main Types
//!
//! - [`TagValue`] - A scalar value read from a PLC tag (bool, integer, real, string or null)
//! - [`TagDescriptor`] - One slot of an armed tag set (name, last value, data type)
//! - [`ConnectionTarget`] - PLC address and slot the acquisition service connects to
//! - [`SessionStats`] - Counters describing the health of the live stream
//!
//! # Positional Correlation
//!
//! Every array the acquisition service returns is aligned by index with the
//! tag list that was submitted when the stream was armed. A [`TagDescriptor`]
//! therefore carries its `index` and is never reordered while streaming.

use serde::{Deserialize, Serialize};

/// A scalar tag value as reported by the acquisition service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum TagValue {
    /// No value (never read, or the read produced nothing)
    #[default]
    Null,
    /// Boolean tag (BOOL)
    Bool(bool),
    /// Integer tag (SINT, INT, DINT, LINT)
    Integer(i64),
    /// Floating point tag (REAL, LREAL)
    Float(f64),
    /// String tag or any value the service stringified
    Text(String),
}

impl TagValue {
    /// Numeric view of the value for plotting
    ///
    /// Booleans map to 0/1, strings are parsed when they look numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Null => None,
            TagValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            TagValue::Integer(i) => Some(*i as f64),
            TagValue::Float(f) => Some(*f),
            TagValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::Null => Ok(()),
            TagValue::Bool(b) => write!(f, "{}", b),
            TagValue::Integer(i) => write!(f, "{}", i),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Integer(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::Float(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

/// PLC address the acquisition service should connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// PLC IP address or host name
    pub host: String,
    /// Backplane slot of the controller
    pub slot: String,
}

impl ConnectionTarget {
    /// Create a new connection target
    pub fn new(host: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            slot: slot.into(),
        }
    }
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (slot {})", self.host, self.slot)
    }
}

/// Stream parameters submitted with a start command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionParams {
    /// Period of the service's read loop in milliseconds
    pub refresh_rate_ms: u64,
    /// Length of the trend window in milliseconds
    pub duration_ms: u64,
}

impl AcquisitionParams {
    /// Create new acquisition parameters
    pub fn new(refresh_rate_ms: u64, duration_ms: u64) -> Self {
        Self {
            refresh_rate_ms,
            duration_ms,
        }
    }
}

/// One slot of an armed tag set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDescriptor {
    /// Position in the submitted tag list; every response array is read at this index
    pub index: usize,
    /// Trimmed, non-empty tag name
    pub name: String,
    /// Last value received for this tag
    pub value: TagValue,
    /// Data type label reported by the service (e.g. "DINT", "REAL")
    pub data_type: Option<String>,
}

impl TagDescriptor {
    /// Create a descriptor with no value yet
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            value: TagValue::Null,
            data_type: None,
        }
    }
}

/// Statistics about the live stream of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Successful sample events applied
    pub samples_applied: u64,
    /// Sample events that carried a failure status
    pub failed_samples: u64,
    /// Samples evicted from the trend window
    pub evictions: u64,
    /// Requests that never received a response in time
    pub requests_timed_out: u64,
    /// Streams stopped by the watchdog
    pub stale_stops: u64,
    /// Events received while not streaming (ignored)
    pub ignored_events: u64,
    /// Sample rate observed over the last stats window in Hz
    pub effective_sample_rate: f64,
}

impl SessionStats {
    /// Calculate the sample success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.samples_applied + self.failed_samples;
        if total == 0 {
            100.0
        } else {
            (self.samples_applied as f64 / total as f64) * 100.0
        }
    }
}
