//! Board storage collaborator.
//!
//! The storage service owns persisted boards. This crate only needs two calls
//! from it: fetch the snapshot once at session start, and append a single
//! operation when the sync channel is unavailable.

mod http;
mod memory;

pub use http::HttpBoardApi;
pub use memory::MemoryBoardApi;

use crate::operation::Operation;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Board not found: {0}")]
    NotFound(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed future for async calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Persisted board record.
///
/// Storage rows may carry `null` for any field but `id`; those read as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_email: String,
    /// Persisted operation log, in order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub canvas_operations: Vec<Operation>,
    /// Collaborator records; shape is owned by the storage service.
    #[serde(default, deserialize_with = "null_as_default")]
    pub shared_with: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl BoardSnapshot {
    /// Empty board with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: "Untitled".to_string(),
            description: String::new(),
            owner_email: String::new(),
            canvas_operations: Vec::new(),
            shared_with: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

/// Request body of the single-operation append endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendOperation {
    pub operation: Operation,
}

/// Trait for the board storage service.
pub trait BoardApi {
    /// Fetch a board snapshot (`GET /boards/{id}`).
    fn fetch_board(&self, board_id: &str) -> BoxFuture<'_, ApiResult<BoardSnapshot>>;

    /// Append one operation (`POST /boards/{id}/operations`).
    fn append_operation(&self, board_id: &str, operation: &Operation) -> BoxFuture<'_, ApiResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let json = r#"{"id":"B1","title":"Notes"}"#;
        let snapshot: BoardSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.title, "Notes");
        assert!(snapshot.canvas_operations.is_empty());
    }

    #[test]
    fn test_snapshot_tolerates_null_fields() {
        let json = r#"{
            "id": "B1",
            "title": null,
            "description": null,
            "owner_email": null,
            "canvas_operations": null,
            "shared_with": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null
        }"#;
        let snapshot: BoardSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.id, "B1");
        assert!(snapshot.title.is_empty());
        assert!(snapshot.description.is_empty());
        assert!(snapshot.canvas_operations.is_empty());
        assert!(snapshot.shared_with.is_empty());
        assert_eq!(snapshot.created_at, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_snapshot_parses_operations() {
        let json = r#"{
            "id": "B1",
            "title": "Physics",
            "description": "",
            "owner_email": "o@example.com",
            "canvas_operations": [
                {"id": "a", "type": "clear", "timestamp": 1},
                {"id": "b", "type": "move", "timestamp": 2, "dx": 1, "dy": 2}
            ],
            "shared_with": [{"userId": "u2", "role": "editor"}],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let snapshot: BoardSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.canvas_operations.len(), 2);
        assert_eq!(snapshot.canvas_operations[1].kind.name(), "move");
        assert_eq!(snapshot.shared_with.len(), 1);
    }
}
