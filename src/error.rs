//! Error handling for the PlcWatch-RS client
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate.

use thiserror::Error;

/// Main error type for PlcWatch-RS operations
#[derive(Error, Debug)]
pub enum PlcWatchError {
    /// No acknowledgment arrived within the call's timeout budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The service answered with a non-Success status
    #[error("{0}")]
    Application(String),

    /// Local input validation failed (never reaches the transport)
    #[error("{0}")]
    Validation(String),

    /// Command is not valid in the current session state
    #[error("Invalid state: cannot {action} while {state}")]
    InvalidState { action: String, state: String },

    /// Another request is still waiting for its response
    #[error("Busy: {0} request still in flight")]
    Busy(String),

    /// Errors raised by the event channel itself
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors related to channel communication between threads
    #[error("Channel error: {0}")]
    Channel(String),

    /// Malformed or unexpected wire events
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PlcWatchError>,
    },
}

impl PlcWatchError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PlcWatchError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error should be shown to the user as a status message
    /// rather than treated as an internal fault
    pub fn is_user_facing(&self) -> bool {
        match self {
            PlcWatchError::Timeout(_)
            | PlcWatchError::Application(_)
            | PlcWatchError::Validation(_)
            | PlcWatchError::Busy(_)
            | PlcWatchError::InvalidState { .. } => true,
            PlcWatchError::WithContext { source, .. } => source.is_user_facing(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for PlcWatchError {
    fn from(err: serde_json::Error) -> Self {
        PlcWatchError::Serialization(err.to_string())
    }
}

impl From<tungstenite::Error> for PlcWatchError {
    fn from(err: tungstenite::Error) -> Self {
        PlcWatchError::Transport(err.to_string())
    }
}

/// Result type alias for PlcWatch-RS operations
pub type Result<T> = std::result::Result<T, PlcWatchError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
