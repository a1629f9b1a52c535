//! BoardSync Core Library
//!
//! Platform-agnostic data structures and logic for keeping a shared
//! whiteboard in sync: the operation model, the materialized log, local
//! undo/redo, presence, the sync channel and the session that ties them
//! together.

pub mod channel;
pub mod config;
pub mod edit_buffer;
pub mod operation;
pub mod oplog;
pub mod presence;
pub mod session;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ChannelEvent, ChannelState, SyncChannel};
pub use config::{ClientConfig, ConfigError};
pub use edit_buffer::EditBuffer;
pub use operation::{Operation, OperationFactory, OperationId, OperationKind};
pub use oplog::OperationLog;
pub use presence::{ActiveUser, CursorPosition, PresenceSet};
pub use session::{Repaint, SessionCoordinator, SessionError, SessionNotice};
pub use storage::{BoardApi, BoardSnapshot, HttpBoardApi, MemoryBoardApi};
pub use sync::{ClientMessage, NativeWebSocket, ServerMessage, Transport};
