//! In-memory boards shared by all connections.

use boardsync_core::operation::Operation;
use boardsync_core::oplog::OperationLog;
use boardsync_core::presence::{ActiveUser, CursorPosition, PresenceSet};
use boardsync_core::storage::BoardSnapshot;
use boardsync_core::sync::{CursorUser, ServerMessage};
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// What a connection does with one broadcast receive.
#[derive(Debug, PartialEq)]
pub enum Relay {
    Send(ServerMessage),
    Skip,
    Stop,
}

/// A message fanned out to a board's connections.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Connection that must not receive this message, if any.
    pub skip: Option<String>,
    pub message: ServerMessage,
}

/// Board state
struct Board {
    /// Broadcast channel for this board
    tx: broadcast::Sender<Outbound>,
    /// Relay order is the canonical order
    log: OperationLog,
    presence: PresenceSet,
    /// Connection id -> user id. One user may hold several connections.
    connections: HashMap<String, String>,
    created_at: String,
}

impl Board {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            log: OperationLog::new(),
            presence: PresenceSet::new(),
            connections: HashMap::new(),
            created_at: boardsync_core::operation::now_millis().to_string(),
        }
    }

    fn broadcast(&self, skip: Option<&str>, message: ServerMessage) {
        // No receivers is fine.
        let _ = self.tx.send(Outbound {
            skip: skip.map(str::to_string),
            message,
        });
    }
}

/// What a new connection needs to start.
pub struct Joined {
    pub rx: broadcast::Receiver<Outbound>,
    pub active_users: Vec<ActiveUser>,
}

/// Shared application state
#[derive(Default)]
pub struct AppState {
    boards: DashMap<String, Board>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Announces the user to others on their first
    /// connection to the board.
    pub fn connect(&self, board_id: &str, connection_id: &str, user: ActiveUser) -> Joined {
        let mut board = self.boards.entry(board_id.to_string()).or_insert_with(Board::new);
        let rx = board.tx.subscribe();
        board
            .connections
            .insert(connection_id.to_string(), user.id.clone());

        if board.presence.join(user.clone()) {
            info!("{} joined board {}", user.email, board_id);
            board.broadcast(Some(connection_id), ServerMessage::UserJoined { user });
        }

        Joined {
            rx,
            active_users: board.presence.iter().cloned().collect(),
        }
    }

    /// Drop a connection. Announces the departure once the user's last
    /// connection is gone.
    pub fn disconnect(&self, board_id: &str, connection_id: &str) {
        let Some(mut board) = self.boards.get_mut(board_id) else {
            return;
        };
        let Some(user_id) = board.connections.remove(connection_id) else {
            return;
        };
        if board.connections.values().any(|id| *id == user_id) {
            return;
        }
        if let Some(user) = board.presence.leave(&user_id) {
            info!("{} left board {}", user.email, board_id);
            board.broadcast(None, ServerMessage::UserLeft { user });
        }
    }

    /// Append and relay to every connection, the sender included.
    /// Returns false for an id already in the log.
    pub fn append(&self, board_id: &str, operation: Operation) -> bool {
        let mut board = self.boards.entry(board_id.to_string()).or_insert_with(Board::new);
        if !board.log.append(operation.clone()) {
            debug!("Duplicate operation {} on board {}", operation.id, board_id);
            return false;
        }
        board.broadcast(None, ServerMessage::Operation { operation });
        true
    }

    /// Record a cursor and relay it to the other connections.
    pub fn update_cursor(&self, board_id: &str, connection_id: &str, cursor: CursorPosition) {
        let Some(mut board) = self.boards.get_mut(board_id) else {
            return;
        };
        let Some(user_id) = board.connections.get(connection_id).cloned() else {
            return;
        };
        if board.presence.update_cursor(&user_id, cursor) {
            board.broadcast(
                Some(connection_id),
                ServerMessage::CursorUpdate {
                    user: CursorUser {
                        id: user_id,
                        cursor: Some(cursor),
                    },
                },
            );
        }
    }

    /// Full operation list, in relay order.
    pub fn operations(&self, board_id: &str) -> Vec<Operation> {
        self.boards
            .get(board_id)
            .map(|board| board.log.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Decide what `connection_id` forwards for one broadcast receive. A lagged
    /// receiver has missed operations and gets the full log instead.
    pub fn relay(&self, board_id: &str, connection_id: &str, received: Result<Outbound, RecvError>) -> Relay {
        match received {
            Ok(outbound) if outbound.skip.as_deref() == Some(connection_id) => Relay::Skip,
            Ok(outbound) => Relay::Send(outbound.message),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Connection {} lagged by {} messages, resyncing", connection_id, skipped);
                Relay::Send(ServerMessage::Sync {
                    operations: self.operations(board_id),
                })
            }
            Err(RecvError::Closed) => Relay::Stop,
        }
    }

    /// Snapshot for the HTTP API. Unknown boards are created empty.
    pub fn snapshot(&self, board_id: &str) -> BoardSnapshot {
        let board = self.boards.entry(board_id.to_string()).or_insert_with(Board::new);
        let mut snapshot = BoardSnapshot::new(board_id);
        snapshot.canvas_operations = board.log.as_slice().to_vec();
        snapshot.created_at = board.created_at.clone();
        snapshot.updated_at = board
            .log
            .iter()
            .last()
            .map(|op| op.timestamp.to_string())
            .unwrap_or_else(|| board.created_at.clone());
        snapshot
    }
}
