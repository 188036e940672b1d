//! Event channel to the acquisition service
//!
//! A [`Transport`] carries [`ClientEvent`]s to the service and hands back
//! [`ServerEvent`]s as they arrive. It never blocks on a response: request
//! correlation and timeouts live in the session, which polls the transport
//! from its event loop.
//!
//! # Implementations
//!
//! - [`ChannelTransport`] - in-process crossbeam channel pair, with the other
//!   end exposed as a [`ServiceEndpoint`]
//! - [`WebSocketTransport`] - `tungstenite` client speaking JSON text frames
//! - [`SimulatedService`] - service simulator driving a [`ServiceEndpoint`]
//!   (feature `mock-service`)
//!
//! # Example
//!
//! ```ignore
//! use plcwatch_rs::transport::{channel_pair, Transport};
//! use plcwatch_rs::protocol::ClientEvent;
//!
//! let (mut transport, endpoint) = channel_pair();
//! transport.open()?;
//! transport.emit(ClientEvent::StartLoop)?;
//! assert_eq!(endpoint.try_recv()?, Some(ClientEvent::StartLoop));
//! ```

pub mod channel;
#[cfg(feature = "mock-service")]
pub mod simulated;
pub mod websocket;

pub use channel::{channel_pair, ChannelTransport, ServiceEndpoint};
#[cfg(feature = "mock-service")]
pub use simulated::{MockDataPattern, SimulatedService, SimulatedServiceHandle, SimulatedTag};
pub use websocket::WebSocketTransport;

use crate::error::Result;
use crate::protocol::{ClientEvent, ServerEvent};

/// Bidirectional, non-blocking event channel
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Establish the channel; a no-op error-free call if already open
    fn open(&mut self) -> Result<()>;

    /// Tear the channel down; safe to call when already closed
    fn close(&mut self);

    /// Whether the channel is currently established
    fn is_open(&self) -> bool;

    /// Send one event to the service
    fn emit(&mut self, event: ClientEvent) -> Result<()>;

    /// Next event from the service, if one has arrived
    fn poll(&mut self) -> Result<Option<ServerEvent>>;
}
