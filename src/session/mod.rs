//! Monitoring session module
//!
//! This module implements the client side of a monitoring run: the
//! connect / arm / stream lifecycle, the staleness watchdog, and the sample
//! sinks the live stream is written into.
//!
//! # Components
//!
//! - [`Session`] - State machine orchestrating the whole lifecycle
//! - [`SessionState`] - Lifecycle states
//! - [`TagSetEditor`] / [`TagSet`] - Editable tag rows and the armed snapshot
//! - [`Watchdog`] - Periodic liveness check
//! - [`SampleSink`] - [`TrendBuffer`] history or [`LatestValueSink`]
//! - [`SessionEvent`] - Notifications for whatever renders the session

pub mod events;
pub mod machine;
pub mod sink;
pub mod state;
pub mod tag_set;
pub mod watchdog;

pub use events::SessionEvent;
pub use machine::{
    RequestKind, Session, EMPTY_TAG_LIST_MESSAGE, STALE_DATA_MESSAGE, TIMEOUT_MESSAGE,
};
pub use sink::{
    sink_for_mode, trend_capacity, LatestValueSink, SampleSink, TrendBuffer, TrendSeries,
};
pub use state::SessionState;
pub use tag_set::{check_unique, TagSet, TagSetEditor};
pub use watchdog::{Watchdog, WatchdogStatus};
