//! WebSocket transport
//!
//! Each event travels as one JSON text frame, `{"event": "<name>", "data": {...}}`.
//! The socket is switched to non-blocking mode after the handshake so
//! [`Transport::poll`] returns immediately when nothing has arrived.

use super::Transport;
use crate::error::{PlcWatchError, Result};
use crate::protocol::{self, ClientEvent, ServerEvent};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tungstenite::http::Uri;
use tungstenite::{Error as WsError, Message, WebSocket};

/// TCP connect and handshake budget
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Send attempts while the socket buffer is full
const SEND_RETRIES: u8 = 5;

/// Client connection to an acquisition service over WebSocket
pub struct WebSocketTransport {
    url: String,
    socket: Option<WebSocket<TcpStream>>,
}

impl WebSocketTransport {
    /// Create a transport for `url` (e.g. `ws://127.0.0.1:5000/events`); nothing connects yet
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            socket: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn connect(&self) -> Result<WebSocket<TcpStream>> {
        let uri: Uri = self
            .url
            .parse()
            .map_err(|e| PlcWatchError::Config(format!("Invalid server URL {}: {}", self.url, e)))?;

        match uri.scheme_str() {
            Some("ws") => {}
            Some(other) => {
                return Err(PlcWatchError::Config(format!(
                    "Unsupported URL scheme '{}', expected ws://",
                    other
                )))
            }
            None => {
                return Err(PlcWatchError::Config(format!(
                    "Server URL {} has no scheme",
                    self.url
                )))
            }
        }

        let host = uri
            .host()
            .ok_or_else(|| PlcWatchError::Config(format!("Server URL {} has no host", self.url)))?;
        let port = uri.port_u16().unwrap_or(80);

        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| PlcWatchError::Transport(format!("Could not resolve {}", host)))?;

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;

        let (socket, _response) = tungstenite::client(self.url.as_str(), stream)
            .map_err(|e| PlcWatchError::Transport(format!("WebSocket handshake failed: {}", e)))?;
        socket.get_ref().set_read_timeout(None)?;
        socket.get_ref().set_nonblocking(true)?;

        Ok(socket)
    }

    fn send_message(socket: &mut WebSocket<TcpStream>, message: Message) -> Result<()> {
        // A WouldBlock here means the frame is queued but not yet flushed
        let mut result = socket.send(message);
        let mut retries = 0_u8;
        loop {
            match result {
                Ok(()) => return Ok(()),
                Err(WsError::Io(ref e))
                    if e.kind() == io::ErrorKind::WouldBlock && retries < SEND_RETRIES =>
                {
                    retries += 1;
                    thread::sleep(Duration::from_millis(2));
                    result = socket.flush();
                }
                Err(WsError::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    tracing::debug!("Socket still busy, frame left queued for the next flush");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = self.connect().map_err(|e| match e {
            PlcWatchError::Config(_) => e,
            other => {
                tracing::warn!("Connecting to {} failed: {}", self.url, other);
                PlcWatchError::Transport(format!(
                    "Acquisition service unreachable at {} ({})",
                    self.url, other
                ))
            }
        })?;
        tracing::info!("Connected to acquisition service at {}", self.url);
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
            tracing::info!("Closed connection to {}", self.url);
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn emit(&mut self, event: ClientEvent) -> Result<()> {
        let socket = self.socket.as_mut().ok_or_else(|| {
            PlcWatchError::Transport(format!("Cannot send {}: transport is closed", event.name()))
        })?;
        let text = protocol::encode(&event)?;
        tracing::debug!("-> {}", text);
        Self::send_message(socket, Message::text(text))
    }

    fn poll(&mut self) -> Result<Option<ServerEvent>> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(None);
        };

        loop {
            match socket.read() {
                Ok(Message::Text(text)) => {
                    tracing::debug!("<- {}", text.as_str());
                    return protocol::decode(text.as_str()).map(Some);
                }
                Ok(Message::Close(_)) => {
                    self.socket = None;
                    return Err(PlcWatchError::Transport(
                        "Service closed the connection".to_string(),
                    ));
                }
                // Pings are answered by tungstenite on the next write/flush
                Ok(_) => continue,
                Err(WsError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    let _ = socket.flush();
                    return Ok(None);
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                    self.socket = None;
                    return Err(PlcWatchError::Transport(
                        "Connection to service lost".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}
