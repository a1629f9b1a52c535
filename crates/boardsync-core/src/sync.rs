//! Wire protocol and WebSocket transport for board collaboration.
//!
//! Messages are JSON text frames tagged by a `type` field:
//! ```json
//! { "type": "sync_request" }
//! { "type": "operation", "operation": { "id": "...", "type": "draw", ... } }
//! { "type": "sync", "operations": [ ... ] }
//! { "type": "user_joined", "user": { "id": "u1", "email": "a@example.com" } }
//! ```

use crate::operation::Operation;
use crate::presence::{ActiveUser, CursorPosition};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Close code for an intentional shutdown. Suppresses reconnection.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Channel is closing")]
    Closing,
    #[error("Not connected")]
    NotConnected,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the full authoritative operation list
    SyncRequest,
    /// Broadcast one new operation
    Operation { operation: Operation },
    /// Share the local cursor
    CursorUpdate { cursor: CursorPosition },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One new operation to append
    Operation { operation: Operation },
    /// Full replacement of the materialized log
    Sync { operations: Vec<Operation> },
    /// Presence add
    UserJoined { user: ActiveUser },
    /// Presence remove
    UserLeft { user: ActiveUser },
    /// Full presence replacement
    ActiveUsers { users: Vec<ActiveUser> },
    /// Patch one user's cursor
    CursorUpdate { user: CursorUser },
}

/// Payload of a cursor update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
}

impl ClientMessage {
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMessage {
    /// Decode an inbound text frame.
    pub fn from_json(text: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build the socket address for a board.
///
/// `server` is the API root, e.g. `ws://127.0.0.1:8080/api`; the result is
/// `{server}/boards/{board_id}/ws?userId=..&email=..[&token=..]`.
pub fn board_socket_url(
    server: &str,
    board_id: &str,
    user_id: &str,
    email: &str,
    token: Option<&str>,
) -> SyncResult<Url> {
    let mut url = Url::parse(server).map_err(|e| SyncError::InvalidUrl(format!("{}: {}", server, e)))?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(SyncError::InvalidUrl(format!(
            "Invalid WebSocket URL scheme: {}",
            url.scheme()
        )));
    }
    url.path_segments_mut()
        .map_err(|_| SyncError::InvalidUrl(server.to_string()))?
        .pop_if_empty()
        .extend(["boards", board_id, "ws"]);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("userId", user_id);
        query.append_pair("email", email);
        if let Some(token) = token {
            query.append_pair("token", token);
        }
    }
    Ok(url)
}

// ============================================================================
// Transport
// ============================================================================

/// Low-level events from a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed
    Opened,
    /// Text frame received
    Message(String),
    /// Connection ended (or never came up)
    Closed { code: u16, reason: String },
    /// Non-fatal error report
    Error(String),
}

/// A persistent bidirectional text connection.
///
/// Implementations must not block: `open` starts the handshake, and progress
/// is reported through `poll_events`.
pub trait Transport {
    /// Start connecting. Fails if a connection is already active.
    fn open(&mut self, url: &Url) -> SyncResult<()>;

    /// Queue a text frame.
    fn send(&mut self, text: &str) -> SyncResult<()>;

    /// Request a close with the given code. A `Closed` event follows.
    fn close(&mut self, code: u16, reason: &str);

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::protocol::CloseFrame;
    use tungstenite::protocol::frame::coding::CloseCode;
    use tungstenite::{Message, connect};

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close { code: u16, reason: String },
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<TransportEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        fn reset(&mut self) {
            self.cmd_tx = None;
            self.event_rx = None;
            self._thread = None;
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for NativeWebSocket {
        fn open(&mut self, url: &Url) -> SyncResult<()> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        fn send(&mut self, text: &str) -> SyncResult<()> {
            match self.cmd_tx {
                Some(ref tx) => tx
                    .send(WsCommand::Send(text.to_string()))
                    .map_err(|e| SyncError::SendFailed(e.to_string())),
                None => Err(SyncError::NotConnected),
            }
        }

        fn close(&mut self, code: u16, reason: &str) {
            if let Some(ref tx) = self.cmd_tx {
                let _ = tx.send(WsCommand::Close {
                    code,
                    reason: reason.to_string(),
                });
            }
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            let mut events = Vec::new();
            let mut finished = false;
            if let Some(ref rx) = self.event_rx {
                loop {
                    match rx.try_recv() {
                        Ok(event) => {
                            if matches!(event, TransportEvent::Closed { .. }) {
                                finished = true;
                            }
                            events.push(event);
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            if !finished {
                                events.push(TransportEvent::Closed {
                                    code: ABNORMAL_CLOSURE,
                                    reason: "Socket thread exited".to_string(),
                                });
                                finished = true;
                            }
                            break;
                        }
                    }
                }
            }
            if finished {
                self.reset();
            }
            events
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.close(NORMAL_CLOSURE, "Client dropped");
            self.reset();
        }
    }

    /// First 100 characters of a frame, for logging.
    fn preview(text: &str) -> String {
        text.chars().take(100).collect()
    }

    /// Socket thread body: connect, then pump commands and frames until closed.
    fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let (mut socket, response) = match connect(url.as_str()) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(TransportEvent::Error(format!("Connection failed: {}", e)));
                let _ = event_tx.send(TransportEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: e.to_string(),
                });
                return;
            }
        };

        log::info!("WebSocket connected, status: {}", response.status());
        let _ = event_tx.send(TransportEvent::Opened);

        // Short read timeout so the loop can service outgoing commands.
        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => {
                log::debug!("TLS or other stream - using default timeout handling");
            }
        }

        let (code, reason) = loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", preview(&msg));
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                Ok(WsCommand::Close { code, reason }) => {
                    log::info!("WebSocket close requested ({})", code);
                    let _ = socket.close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    }));
                    break (code, reason);
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    let _ = socket.close(None);
                    break (NORMAL_CLOSURE, "Client dropped".to_string());
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", preview(&txt));
                    let _ = event_tx.send(TransportEvent::Message(txt));
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(frame)) => {
                    log::info!("WebSocket received close frame");
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (ABNORMAL_CLOSURE, "Closed without status".to_string()),
                    };
                }
                Ok(_) => {} // Ignore binary, pong
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
            }
        };

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(TransportEvent::Closed { code, reason });
    }
}

pub use native_client::NativeWebSocket;
