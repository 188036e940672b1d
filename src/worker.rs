//! Session worker thread
//!
//! This module runs a [`Session`] on its own thread and connects it to the
//! rest of the application through crossbeam channels.
//!
//! # Responsibilities
//!
//! The worker thread handles:
//!
//! - **Command processing**: Applies [`SessionCommand`]s (connect, start, stop, reset, tag edits)
//! - **Transport pumping**: Polls the transport and runs request deadlines and the watchdog
//! - **Event forwarding**: Republishes every [`SessionEvent`] as a [`WorkerMessage`]
//! - **Statistics tracking**: Publishes [`SessionStats`](crate::types::SessionStats) once per second
//! - **Teardown**: Sends the best-effort disconnect when shutting down
//!
//! # Example
//!
//! ```ignore
//! let (worker, handle) = SessionWorker::new(session);
//! std::thread::spawn(move || worker.run());
//!
//! handle.connect(ConnectionTarget::new("192.168.0.1", "0"));
//! for msg in handle.drain() {
//!     if let WorkerMessage::Event(SessionEvent::StateChanged { to, .. }) = msg {
//!         println!("now {}", to);
//!     }
//! }
//! handle.shutdown();
//! ```

use crate::session::{Session, SessionEvent};
use crate::types::{AcquisitionParams, ConnectionTarget};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often stats are published
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep between loop iterations when nothing happened
const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// Message sent from the application to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Connect to a PLC through the service
    Connect(ConnectionTarget),
    /// Arm the current tag rows and start streaming
    Start(AcquisitionParams),
    /// Stop the stream
    Stop,
    /// Return to a fresh idle session
    Reset,
    /// Append a blank tag row
    AddTagRow,
    /// Remove the last tag row
    RemoveTagRow,
    /// Set the name in one tag row
    SetTagName { index: usize, name: String },
    /// Replace every tag row
    SetTagRows(Vec<String>),
    /// Request current statistics
    RequestStats,
    /// Tear down and stop the worker
    Shutdown,
}

impl SessionCommand {
    /// Short name used in logs and error reports
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Connect(_) => "connect",
            SessionCommand::Start(_) => "start",
            SessionCommand::Stop => "stop",
            SessionCommand::Reset => "reset",
            SessionCommand::AddTagRow => "add_tag_row",
            SessionCommand::RemoveTagRow => "remove_tag_row",
            SessionCommand::SetTagName { .. } => "set_tag_name",
            SessionCommand::SetTagRows(_) => "set_tag_rows",
            SessionCommand::RequestStats => "request_stats",
            SessionCommand::Shutdown => "shutdown",
        }
    }
}

/// Message sent from the worker to the application
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Something changed in the session
    Event(SessionEvent),
    /// A command was refused
    CommandError {
        command: &'static str,
        error: String,
    },
    /// The transport reported a failure
    TransportError(String),
    /// Worker is shutting down
    Shutdown,
}

/// Application-side handle to a running worker
pub struct SessionHandle {
    /// Receiver for worker messages
    pub receiver: Receiver<WorkerMessage>,
    /// Sender for commands to the worker
    pub command_sender: Sender<SessionCommand>,
}

impl SessionHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerMessage> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the worker
    pub fn send_command(&self, cmd: SessionCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    /// Request a PLC connection
    pub fn connect(&self, target: ConnectionTarget) {
        let _ = self.command_sender.send(SessionCommand::Connect(target));
    }

    /// Arm the tag rows and start streaming
    pub fn start(&self, params: AcquisitionParams) {
        let _ = self.command_sender.send(SessionCommand::Start(params));
    }

    /// Stop streaming
    pub fn stop(&self) {
        let _ = self.command_sender.send(SessionCommand::Stop);
    }

    /// Reset the session
    pub fn reset(&self) {
        let _ = self.command_sender.send(SessionCommand::Reset);
    }

    /// Append a blank tag row
    pub fn add_tag_row(&self) {
        let _ = self.command_sender.send(SessionCommand::AddTagRow);
    }

    /// Remove the last tag row
    pub fn remove_tag_row(&self) {
        let _ = self.command_sender.send(SessionCommand::RemoveTagRow);
    }

    /// Set the name in one tag row
    pub fn set_tag_name(&self, index: usize, name: impl Into<String>) {
        let _ = self.command_sender.send(SessionCommand::SetTagName {
            index,
            name: name.into(),
        });
    }

    /// Replace every tag row
    pub fn set_tag_rows(&self, names: Vec<String>) {
        let _ = self.command_sender.send(SessionCommand::SetTagRows(names));
    }

    /// Ask for a stats snapshot
    pub fn request_stats(&self) {
        let _ = self.command_sender.send(SessionCommand::RequestStats);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(SessionCommand::Shutdown);
    }
}

/// Runs a session loop on its own thread
pub struct SessionWorker {
    session: Session,
    /// Command receiver from the application
    command_rx: Receiver<SessionCommand>,
    /// Message sender to the application
    message_tx: Sender<WorkerMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Last time stats were published
    last_stats_time: Instant,
    /// Samples applied at the last stats publish
    samples_at_last_stats: u64,
    /// Last transport error reported, to avoid repeating it every iteration
    last_transport_error: Option<String>,
}

impl SessionWorker {
    /// Create a worker and the handle that talks to it
    pub fn new(session: Session) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure if the application stops draining
        let (msg_tx, msg_rx) = bounded(10_000);

        let worker = Self {
            session,
            command_rx: cmd_rx,
            message_tx: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
            last_stats_time: Instant::now(),
            samples_at_last_stats: 0,
            last_transport_error: None,
        };

        let handle = SessionHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (worker, handle)
    }

    /// Get a handle to stop the worker
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the main worker loop until shutdown
    pub fn run(mut self) {
        tracing::info!("Session worker started");

        while self.running.load(Ordering::SeqCst) {
            let commands = self.process_commands();

            let handled = match self.session.pump() {
                Ok(handled) => {
                    self.last_transport_error = None;
                    handled
                }
                Err(e) => {
                    self.report_transport_error(e.to_string());
                    0
                }
            };

            self.forward_events();

            if self.last_stats_time.elapsed() >= STATS_INTERVAL {
                self.send_stats();
            }

            if commands == 0 && handled == 0 {
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        // Cleanup
        self.session.teardown();
        self.forward_events();

        let _ = self.message_tx.send(WorkerMessage::Shutdown);
        tracing::info!("Session worker stopped");
    }

    /// Process pending commands; returns how many were handled
    fn process_commands(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => {
                    count += 1;
                    self.handle_command(cmd);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
        count
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: SessionCommand) {
        let name = cmd.name();
        tracing::debug!("Command: {}", name);

        let result = match cmd {
            SessionCommand::Connect(target) => self.session.connect(target),
            SessionCommand::Start(params) => self.session.start(params),
            SessionCommand::Stop => self.session.stop(),
            SessionCommand::Reset => {
                self.session.reset();
                Ok(())
            }
            SessionCommand::AddTagRow => self.session.add_tag_row().map(|_| ()),
            SessionCommand::RemoveTagRow => self.session.remove_tag_row(),
            SessionCommand::SetTagName { index, name } => self.session.set_tag_name(index, name),
            SessionCommand::SetTagRows(names) => self.session.set_tag_rows(names),
            SessionCommand::RequestStats => {
                self.send_stats();
                Ok(())
            }
            SessionCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
                Ok(())
            }
        };

        if let Err(e) = result {
            if e.is_user_facing() {
                tracing::info!("{} refused: {}", name, e);
            } else {
                tracing::warn!("{} failed: {}", name, e);
            }
            self.send(WorkerMessage::CommandError {
                command: name,
                error: e.to_string(),
            });
        }
    }

    fn forward_events(&mut self) {
        for event in self.session.drain_events() {
            self.send(WorkerMessage::Event(event));
        }
    }

    fn send_stats(&mut self) {
        let elapsed = self.last_stats_time.elapsed().as_secs_f64();
        let mut stats = self.session.stats().clone();
        if elapsed > 0.0 {
            stats.effective_sample_rate =
                stats.samples_applied.saturating_sub(self.samples_at_last_stats) as f64 / elapsed;
        }
        self.samples_at_last_stats = stats.samples_applied;
        self.last_stats_time = Instant::now();
        self.send(WorkerMessage::Event(SessionEvent::Stats(stats)));
    }

    fn report_transport_error(&mut self, error: String) {
        if self.last_transport_error.as_deref() == Some(error.as_str()) {
            return;
        }
        tracing::warn!("Transport error: {}", error);
        self.last_transport_error = Some(error.clone());
        self.send(WorkerMessage::TransportError(error));
    }

    fn send(&self, msg: WorkerMessage) {
        match self.message_tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Session handle not draining messages, dropping one");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }
}
