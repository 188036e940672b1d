//! Session lifecycle states

use serde::{Deserialize, Serialize};

/// Where a session is in its connect / arm / stream lifecycle
///
/// ```text
/// Idle ──connect──▶ Connecting ──ok──▶ Connected ──start──▶ Arming ──ok──▶ Streaming
///  ▲                    │fail/timeout                          │fail/timeout    │stop/stale
///  │◀───────────────────┘                     Connected/Stopped◀┘                ▼
///  └──────────────────────────── reset (from anywhere) ◀──────────────────── Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// No PLC connection
    #[default]
    Idle,
    /// `connect_to_PLC` sent, waiting for `connect_response`
    Connecting,
    /// PLC connection established, nothing streaming
    Connected,
    /// `first_read` sent, waiting for `first_read_response`
    Arming,
    /// Service loop running, `tagData` expected
    Streaming,
    /// Loop halted by the user or the watchdog; can be re-armed
    Stopped,
}

impl SessionState {
    /// Whether a request is outstanding in this state
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Arming)
    }

    /// Whether a PLC connection has been established
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::Connected
                | SessionState::Arming
                | SessionState::Streaming
                | SessionState::Stopped
        )
    }

    /// Whether a new tag set may be armed from this state
    pub fn can_start(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Stopped)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Arming => write!(f, "Arming"),
            SessionState::Streaming => write!(f, "Streaming"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}
