//! Sync channel: connection state machine over a [`Transport`].
//!
//! ```text
//! Disconnected -> Connecting -> Open -> (Closing) -> Disconnected
//!                     ^                     |
//!                     +-- ReconnectPending <+  (abnormal close)
//! ```
//!
//! Time is supplied by the caller through [`SyncChannel::poll`], so the
//! reconnect timer is a plain deadline. There is at most one.

use crate::operation::Operation;
use crate::presence::CursorPosition;
use crate::sync::{
    ClientMessage, NORMAL_CLOSURE, ServerMessage, SyncError, SyncResult, Transport, TransportEvent,
};
use std::time::{Duration, Instant};
use url::Url;

/// Delay before reconnecting after an abnormal close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    /// Waiting for the reconnect timer to fire.
    ReconnectPending,
}

/// Events produced by [`SyncChannel::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Handshake completed and a `sync_request` was sent.
    Opened,
    /// A decoded server message.
    Message(ServerMessage),
    /// The connection ended. `reconnect_at` is set when a retry was scheduled.
    Closed { code: u16, reconnect_at: Option<Instant> },
    /// The reconnect timer fired and a new connection attempt started.
    Reconnecting,
    /// Transport-level error report.
    Error(String),
}

/// Exclusively owned connection to one board.
pub struct SyncChannel<T: Transport> {
    transport: T,
    url: Url,
    state: ChannelState,
    reconnect_delay: Duration,
    /// Pending reconnect deadline.
    reconnect_at: Option<Instant>,
}

impl<T: Transport> SyncChannel<T> {
    pub fn new(transport: T, url: Url) -> Self {
        Self {
            transport,
            url,
            state: ChannelState::Disconnected,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_at: None,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Deadline of the pending reconnect, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Start connecting.
    ///
    /// Rejected while a connection is already active or closing. Calling this
    /// while a reconnect is pending connects now and cancels the timer.
    pub fn connect(&mut self) -> SyncResult<()> {
        match self.state {
            ChannelState::Connecting | ChannelState::Open => return Err(SyncError::AlreadyConnected),
            ChannelState::Closing => return Err(SyncError::Closing),
            ChannelState::Disconnected | ChannelState::ReconnectPending => {}
        }

        self.reconnect_at = None;
        self.state = ChannelState::Connecting;
        log::info!("Connecting to {}", self.url);
        if let Err(e) = self.transport.open(&self.url) {
            self.state = ChannelState::Disconnected;
            return Err(e);
        }
        Ok(())
    }

    /// Intentional close. Never reconnects and cancels any pending timer.
    pub fn close(&mut self) {
        self.reconnect_at = None;
        match self.state {
            ChannelState::Connecting | ChannelState::Open => {
                self.transport.close(NORMAL_CLOSURE, "Client closed");
                self.state = ChannelState::Closing;
            }
            ChannelState::ReconnectPending => {
                self.state = ChannelState::Disconnected;
            }
            ChannelState::Closing | ChannelState::Disconnected => {}
        }
    }

    /// Send a message. Only allowed while open.
    pub fn send(&mut self, message: &ClientMessage) -> SyncResult<()> {
        if self.state != ChannelState::Open {
            return Err(SyncError::NotConnected);
        }
        let json = message.to_json()?;
        self.transport.send(&json)
    }

    /// Broadcast one operation.
    pub fn send_operation(&mut self, operation: &Operation) -> SyncResult<()> {
        self.send(&ClientMessage::Operation {
            operation: operation.clone(),
        })
    }

    pub fn send_cursor(&mut self, cursor: CursorPosition) -> SyncResult<()> {
        self.send(&ClientMessage::CursorUpdate { cursor })
    }

    /// Process transport events and fire the reconnect timer if due.
    pub fn poll(&mut self, now: Instant) -> Vec<ChannelEvent> {
        let mut out = Vec::new();

        for event in self.transport.poll_events() {
            match event {
                TransportEvent::Opened => self.on_opened(&mut out),
                TransportEvent::Message(text) => match ServerMessage::from_json(&text) {
                    Ok(message) => out.push(ChannelEvent::Message(message)),
                    Err(e) => log::warn!("Discarding malformed message ({}): {}", e, text),
                },
                TransportEvent::Closed { code, reason } => self.on_closed(code, &reason, now, &mut out),
                TransportEvent::Error(message) => {
                    log::warn!("Transport error: {}", message);
                    out.push(ChannelEvent::Error(message));
                }
            }
        }

        if self.state == ChannelState::ReconnectPending
            && self.reconnect_at.is_some_and(|deadline| now >= deadline)
        {
            self.reconnect_at = None;
            log::info!("Reconnect timer fired");
            out.push(ChannelEvent::Reconnecting);
            self.state = ChannelState::Disconnected;
            if let Err(e) = self.connect() {
                log::warn!("Reconnect attempt failed to start: {}", e);
                self.schedule_reconnect(now);
            }
        }

        out
    }

    fn on_opened(&mut self, out: &mut Vec<ChannelEvent>) {
        if self.state != ChannelState::Connecting {
            log::debug!("Ignoring open event in state {:?}", self.state);
            return;
        }
        log::info!("Connection established");
        self.state = ChannelState::Open;
        self.reconnect_at = None;

        if let Err(e) = self.send(&ClientMessage::SyncRequest) {
            log::error!("Failed to request sync: {}", e);
        }
        out.push(ChannelEvent::Opened);
    }

    fn on_closed(&mut self, code: u16, reason: &str, now: Instant, out: &mut Vec<ChannelEvent>) {
        log::info!("Connection closed ({}): {}", code, reason);
        match self.state {
            ChannelState::Disconnected | ChannelState::ReconnectPending => {
                log::debug!("Ignoring stale close event");
            }
            ChannelState::Closing => {
                self.state = ChannelState::Disconnected;
                out.push(ChannelEvent::Closed { code, reconnect_at: None });
            }
            ChannelState::Connecting | ChannelState::Open => {
                if code == NORMAL_CLOSURE {
                    self.state = ChannelState::Disconnected;
                } else {
                    self.schedule_reconnect(now);
                }
                out.push(ChannelEvent::Closed {
                    code,
                    reconnect_at: self.reconnect_at,
                });
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if self.reconnect_at.is_none() {
            self.reconnect_at = Some(now + self.reconnect_delay);
            log::info!("Reconnecting in {:?}", self.reconnect_delay);
        }
        self.state = ChannelState::ReconnectPending;
    }
}

impl<T: Transport> Drop for SyncChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}
