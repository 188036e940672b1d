//! Session timing and sink settings
//!
//! These settings shape how a [`Session`](crate::session::Session) behaves at
//! runtime, separate from where it connects to. They control request timeout
//! classes, the watchdog cadence, and which sample sink receives the stream.
//!
//! # Timeout Classes
//!
//! Every fallible remote call is bounded so the client never hangs on a
//! silently dropped request:
//!
//! - **Short** (5 s): interactive reads expected to complete quickly (`first_read`)
//! - **Medium** (10 s): staleness threshold for the live stream
//! - **Long** (60 s): connection setup, which may involve device negotiation

use serde::{Deserialize, Serialize};

/// Default short timeout in milliseconds
pub const DEFAULT_SHORT_TIMEOUT_MS: u64 = 5_000;

/// Default medium timeout in milliseconds
pub const DEFAULT_MEDIUM_TIMEOUT_MS: u64 = 10_000;

/// Default long timeout in milliseconds
pub const DEFAULT_LONG_TIMEOUT_MS: u64 = 60_000;

/// Default watchdog check interval in milliseconds
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 1_000;

/// Timeout budget per call class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Budget for `first_read`
    #[serde(default = "default_short")]
    pub short_ms: u64,
    /// Staleness threshold for the stream
    #[serde(default = "default_medium")]
    pub medium_ms: u64,
    /// Budget for `connect_to_PLC`
    #[serde(default = "default_long")]
    pub long_ms: u64,
}

fn default_short() -> u64 {
    DEFAULT_SHORT_TIMEOUT_MS
}

fn default_medium() -> u64 {
    DEFAULT_MEDIUM_TIMEOUT_MS
}

fn default_long() -> u64 {
    DEFAULT_LONG_TIMEOUT_MS
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            short_ms: DEFAULT_SHORT_TIMEOUT_MS,
            medium_ms: DEFAULT_MEDIUM_TIMEOUT_MS,
            long_ms: DEFAULT_LONG_TIMEOUT_MS,
        }
    }
}

/// Which clock feeds the watchdog's "last sample" timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StalenessClock {
    /// Local receipt time of each successful sample
    #[default]
    Local,
    /// `TimeStamp` carried by the sample itself
    Server,
}

impl std::fmt::Display for StalenessClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StalenessClock::Local => write!(f, "Local receipt time"),
            StalenessClock::Server => write!(f, "Server timestamp"),
        }
    }
}

/// Watchdog cadence and clock source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogSettings {
    /// How often the liveness check runs
    #[serde(default = "default_watchdog_interval")]
    pub interval_ms: u64,
    /// Clock used to stamp successful samples
    #[serde(default)]
    pub clock: StalenessClock,
}

fn default_watchdog_interval() -> u64 {
    DEFAULT_WATCHDOG_INTERVAL_MS
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            clock: StalenessClock::Local,
        }
    }
}

/// How the session retains samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SinkMode {
    /// Bounded history window per tag (plotting)
    #[default]
    Trend,
    /// Latest value only (watch window)
    LatestOnly,
}

impl std::fmt::Display for SinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkMode::Trend => write!(f, "Trend"),
            SinkMode::LatestOnly => write!(f, "Latest value"),
        }
    }
}

/// Everything a session needs to know about timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub watchdog: WatchdogSettings,
}

impl SessionSettings {
    /// Staleness threshold used by the watchdog
    pub fn stale_after_ms(&self) -> u64 {
        self.timeouts.medium_ms
    }
}
