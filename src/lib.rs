//! # PlcWatch-RS: PLC tag monitoring client
//!
//! A client for a remote data acquisition service that reads tags from a PLC.
//! The client drives the service through a connect / arm / stream lifecycle,
//! detects a stalled stream with a watchdog, and shapes the unbounded stream
//! of samples into a fixed-size trend window (or a latest-value table).
//!
//! ## Architecture
//!
//! - **Session**: Single-threaded state machine owning the lifecycle, with injected
//!   transport, clock and sample sink
//! - **Transport**: Non-blocking event channel to the service (WebSocket or in-process)
//! - **Worker**: Runs the session loop on its own thread
//! - **Communication**: Crossbeam channels between the worker and its handle
//!
//! ## Configuration
//!
//! Application state (recent connection targets) is stored in the platform-appropriate
//! data directory under `dev.hxyulin.plcwatch-rs`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.plcwatch-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.plcwatch-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.plcwatch-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use plcwatch_rs::{
//!     clock::SystemClock,
//!     config::AppConfig,
//!     session::Session,
//!     transport::WebSocketTransport,
//!     worker::SessionWorker,
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::load("plant.toml")?;
//! let transport = WebSocketTransport::new(&config.connection.server_url);
//! let session = Session::from_config(&config, Box::new(transport), Arc::new(SystemClock));
//!
//! let (worker, handle) = SessionWorker::new(session);
//! std::thread::spawn(move || worker.run());
//!
//! handle.connect(config.connection.target());
//! handle.start(config.acquisition.params());
//! for msg in handle.drain() {
//!     println!("{:?}", msg);
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::{AppConfig, AppState};
pub use error::{PlcWatchError, Result};
pub use session::{Session, SessionEvent, SessionState};
pub use types::{AcquisitionParams, ConnectionTarget, TagDescriptor, TagValue};
pub use worker::{SessionCommand, SessionHandle, SessionWorker, WorkerMessage};
