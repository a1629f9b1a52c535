//! Local undo/redo over operations authored in this session.
//!
//! The buffer never edits the shared log. Undo moves an operation to the redo
//! stack and marks it hidden; nothing is retracted on the wire. An operation
//! stays hidden after a later commit truncates the redo branch, until a redo or
//! an authoritative sync brings it back.

use crate::operation::{Operation, OperationId};
use std::collections::HashSet;

/// Default number of undoable operations to keep.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct EditBuffer {
    undo_stack: Vec<Operation>,
    redo_stack: Vec<Operation>,
    /// Undone ids, including those no longer redoable.
    hidden: HashSet<OperationId>,
    max_history: usize,
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl EditBuffer {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            hidden: HashSet::new(),
            max_history: max_history.max(1),
        }
    }

    /// Record a new local operation. Truncates the redo branch.
    /// Returns the operation the caller must broadcast.
    pub fn commit(&mut self, operation: Operation) -> &Operation {
        self.redo_stack.clear();
        self.undo_stack.push(operation);

        // Oldest entries fall off; they stay in the shared log regardless.
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }

        &self.undo_stack[self.undo_stack.len() - 1]
    }

    /// Undo the latest local operation.
    /// Returns the undone operation, or None if there is nothing to undo.
    pub fn undo(&mut self) -> Option<&Operation> {
        let operation = self.undo_stack.pop()?;
        self.hidden.insert(operation.id.clone());
        self.redo_stack.push(operation);
        self.redo_stack.last()
    }

    /// Redo the latest undone operation.
    /// Returns the operation the caller must send again.
    pub fn redo(&mut self) -> Option<&Operation> {
        let operation = self.redo_stack.pop()?;
        self.hidden.remove(&operation.id);
        self.undo_stack.push(operation);
        self.undo_stack.last()
    }

    /// Reset history to a single clear operation.
    pub fn clear(&mut self, clear_operation: Operation) {
        debug_assert!(clear_operation.is_clear());
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.undo_stack.push(clear_operation);
    }

    /// Unhide `ids` and drop their redo entries.
    pub fn forget<'a>(&mut self, ids: impl IntoIterator<Item = &'a OperationId>) {
        let ids: HashSet<&OperationId> = ids.into_iter().collect();
        self.hidden.retain(|id| !ids.contains(id));
        self.redo_stack.retain(|op| !ids.contains(&op.id));
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Ids currently undone (hidden from the local view).
    pub fn undone_ids(&self) -> impl Iterator<Item = &OperationId> {
        self.hidden.iter()
    }

    pub fn is_undone(&self, id: &OperationId) -> bool {
        self.hidden.contains(id)
    }

    pub fn undo_stack(&self) -> &[Operation] {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &[Operation] {
        &self.redo_stack
    }
}
