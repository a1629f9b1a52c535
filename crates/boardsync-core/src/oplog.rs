//! The materialized operation log.

use crate::operation::{Operation, OperationId};
use std::collections::HashSet;

/// Ordered, id-deduplicated sequence of operations.
///
/// Insertion order is the rendering order. The id set only answers
/// membership; it never reorders anything.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    operations: Vec<Operation>,
    ids: HashSet<OperationId>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from a list, keeping the first occurrence of each id.
    pub fn from_operations(operations: Vec<Operation>) -> Self {
        let mut log = Self::new();
        log.replace(operations);
        log
    }

    /// Append an operation unless its id is already present.
    /// Returns true if the log changed.
    pub fn append(&mut self, operation: Operation) -> bool {
        if self.ids.contains(&operation.id) {
            return false;
        }
        self.ids.insert(operation.id.clone());
        self.operations.push(operation);
        true
    }

    /// Replace the whole log.
    pub fn replace(&mut self, operations: Vec<Operation>) {
        self.operations.clear();
        self.ids.clear();
        for operation in operations {
            let id = operation.id.clone();
            if !self.append(operation) {
                log::debug!("Dropping duplicate operation {} from replacement list", id);
            }
        }
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &OperationId) -> Option<&Operation> {
        if !self.contains(id) {
            return None;
        }
        self.operations.iter().find(|op| &op.id == id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn as_slice(&self) -> &[Operation] {
        &self.operations
    }

    /// Ids in log order.
    pub fn ids(&self) -> impl Iterator<Item = &OperationId> {
        self.operations.iter().map(|op| &op.id)
    }
}
