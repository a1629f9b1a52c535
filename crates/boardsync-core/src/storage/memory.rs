//! In-memory board API.

use super::{ApiError, ApiResult, BoardApi, BoardSnapshot, BoxFuture};
use crate::operation::Operation;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory board store for testing and offline use.
///
/// Can be switched offline to simulate an unreachable service.
#[derive(Default)]
pub struct MemoryBoardApi {
    boards: RwLock<HashMap<String, BoardSnapshot>>,
    offline: AtomicBool,
}

impl MemoryBoardApi {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a board.
    pub fn insert(&self, snapshot: BoardSnapshot) {
        if let Ok(mut boards) = self.boards.write() {
            boards.insert(snapshot.id.clone(), snapshot);
        }
    }

    /// Make every call fail with `ApiError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Operations stored for a board.
    pub fn operations(&self, board_id: &str) -> Vec<Operation> {
        self.boards
            .read()
            .ok()
            .and_then(|boards| boards.get(board_id).map(|b| b.canvas_operations.clone()))
            .unwrap_or_default()
    }

    fn check_online(&self) -> ApiResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ApiError::Unavailable("storage offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl BoardApi for MemoryBoardApi {
    fn fetch_board(&self, board_id: &str) -> BoxFuture<'_, ApiResult<BoardSnapshot>> {
        let id = board_id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let boards = self
                .boards
                .read()
                .map_err(|e| ApiError::Unavailable(format!("Lock error: {}", e)))?;
            boards.get(&id).cloned().ok_or(ApiError::NotFound(id))
        })
    }

    fn append_operation(&self, board_id: &str, operation: &Operation) -> BoxFuture<'_, ApiResult<()>> {
        let id = board_id.to_string();
        let operation = operation.clone();
        Box::pin(async move {
            self.check_online()?;
            let mut boards = self
                .boards
                .write()
                .map_err(|e| ApiError::Unavailable(format!("Lock error: {}", e)))?;
            let board = boards.get_mut(&id).ok_or_else(|| ApiError::NotFound(id.clone()))?;
            if board.canvas_operations.iter().all(|op| op.id != operation.id) {
                board.canvas_operations.push(operation);
            }
            Ok(())
        })
    }
}
