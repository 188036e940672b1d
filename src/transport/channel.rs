//! In-process transport over crossbeam channels

use super::Transport;
use crate::error::{PlcWatchError, Result};
use crate::protocol::{ClientEvent, ServerEvent};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::time::Duration;

/// Create a connected transport / service endpoint pair
pub fn channel_pair() -> (ChannelTransport, ServiceEndpoint) {
    let (client_tx, client_rx) = bounded(256);
    // Service pushes can burst at high refresh rates
    let (service_tx, service_rx) = bounded(10_000);

    let transport = ChannelTransport {
        to_service: client_tx,
        from_service: service_rx,
        open: false,
    };
    let endpoint = ServiceEndpoint {
        from_client: client_rx,
        to_client: service_tx,
    };
    (transport, endpoint)
}

/// Client side of an in-process channel pair
pub struct ChannelTransport {
    to_service: Sender<ClientEvent>,
    from_service: Receiver<ServerEvent>,
    open: bool,
}

impl Transport for ChannelTransport {
    fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        // Anything left over belongs to a previous connection
        let stale = self.from_service.try_iter().count();
        if stale > 0 {
            tracing::debug!("Discarded {} stale service events on open", stale);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn emit(&mut self, event: ClientEvent) -> Result<()> {
        if !self.open {
            return Err(PlcWatchError::Transport(format!(
                "Cannot send {}: transport is closed",
                event.name()
            )));
        }
        self.to_service
            .send(event)
            .map_err(|e| PlcWatchError::Transport(format!("Service endpoint dropped: {}", e)))
    }

    fn poll(&mut self) -> Result<Option<ServerEvent>> {
        if !self.open {
            return Ok(None);
        }
        match self.from_service.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PlcWatchError::Transport(
                "Service endpoint dropped".to_string(),
            )),
        }
    }
}

/// Service side of an in-process channel pair
pub struct ServiceEndpoint {
    from_client: Receiver<ClientEvent>,
    to_client: Sender<ServerEvent>,
}

impl ServiceEndpoint {
    /// Next client event without blocking
    pub fn try_recv(&self) -> Result<Option<ClientEvent>> {
        match self.from_client.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(PlcWatchError::Channel("Client transport dropped".to_string()))
            }
        }
    }

    /// Wait up to `timeout` for the next client event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ClientEvent>> {
        match self.from_client.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PlcWatchError::Channel("Client transport dropped".to_string()))
            }
        }
    }

    /// All client events received so far
    pub fn drain(&self) -> Vec<ClientEvent> {
        self.from_client.try_iter().collect()
    }

    /// Push an event to the client
    pub fn send(&self, event: ServerEvent) -> Result<()> {
        self.to_client.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => PlcWatchError::Channel(format!(
                "Client not draining events, dropped {}",
                event.name()
            )),
            TrySendError::Disconnected(_) => {
                PlcWatchError::Channel("Client transport dropped".to_string())
            }
        })
    }
}
