//! Notifications a session raises for its observers

use super::SessionState;
use crate::types::{SessionStats, TagDescriptor, TagValue};

/// Something observable changed inside a [`Session`](super::Session)
///
/// Events accumulate in the session's outbox and are drained by whoever
/// drives it (the worker thread, a CLI loop or a test).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Lifecycle transition
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Status message set (`Some`) or cleared (`None`)
    Status(Option<String>),
    /// Tag names the connected controller exposes
    KnownTags(Vec<String>),
    /// A tag set was armed; descriptors carry first-read values and types
    TagsArmed(Vec<TagDescriptor>),
    /// A successful sample was applied
    Sample {
        timestamp_ms: i64,
        values: Vec<TagValue>,
    },
    /// Tag set and sample history were discarded
    TagsCleared,
    /// Stream statistics snapshot
    Stats(SessionStats),
}
