//! In-memory operation store
//!
//! Operations are kept in insertion order behind a single `RwLock`. Every
//! status or result change replaces one record under the write lock, so
//! readers never observe a status without its matching result.

use parking_lot::RwLock;

use npmx_core::{
    ExecutionResult, NewOperation, Operation, OperationError, OperationId, OperationStatus,
};

/// Ordered collection of every operation queued during this process
pub struct OperationStore {
    operations: RwLock<Vec<Operation>>,
}

impl OperationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of all operations in insertion order
    pub fn list(&self) -> Vec<Operation> {
        self.operations.read().clone()
    }

    /// Get a copy of one operation
    pub fn get(&self, id: &OperationId) -> Option<Operation> {
        self.operations.read().iter().find(|op| &op.id == id).cloned()
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.operations.read().is_empty()
    }

    /// Queue one `pending` operation
    pub fn add(&self, request: NewOperation) -> Result<Operation, OperationError> {
        let op = Operation::create(request)?;
        self.operations.write().push(op.clone());
        tracing::debug!("Queued operation {} ({})", op.id, op.kind);
        Ok(op)
    }

    /// Queue several operations; nothing is added unless all of them are valid
    pub fn add_batch(&self, requests: Vec<NewOperation>) -> Result<Vec<Operation>, OperationError> {
        let created = requests
            .into_iter()
            .map(Operation::create)
            .collect::<Result<Vec<_>, _>>()?;

        self.operations.write().extend(created.iter().cloned());
        tracing::debug!("Queued batch of {} operations", created.len());
        Ok(created)
    }

    /// Apply a state transition to one record under the write lock
    fn update<F>(&self, id: &OperationId, f: F) -> Result<Operation, OperationError>
    where
        F: FnOnce(&mut Operation) -> Result<(), OperationError>,
    {
        let mut operations = self.operations.write();
        let op = operations
            .iter_mut()
            .find(|op| &op.id == id)
            .ok_or_else(|| OperationError::NotFound(id.clone()))?;
        f(op)?;
        Ok(op.clone())
    }

    /// `pending -> approved`
    pub fn approve(&self, id: &OperationId) -> Result<Operation, OperationError> {
        self.update(id, Operation::approve)
    }

    /// Approve every pending operation, returning how many changed
    pub fn approve_all(&self) -> usize {
        let mut operations = self.operations.write();
        let mut count = 0;
        for op in operations
            .iter_mut()
            .filter(|op| op.status == OperationStatus::Pending)
        {
            if op.approve().is_ok() {
                count += 1;
            }
        }
        count
    }

    /// `failed -> approved`, clearing the previous result
    pub fn retry(&self, id: &OperationId) -> Result<Operation, OperationError> {
        self.update(id, Operation::retry)
    }

    /// `approved -> running`; scheduler only
    pub(crate) fn start(&self, id: &OperationId) -> Result<Operation, OperationError> {
        self.update(id, Operation::start)
    }

    /// Record an executor result; scheduler only
    pub(crate) fn finish(
        &self,
        id: &OperationId,
        result: ExecutionResult,
    ) -> Result<Operation, OperationError> {
        self.update(id, |op| op.finish(result))
    }

    /// Fail an operation whose predecessor failed; scheduler only
    pub(crate) fn skip(&self, id: &OperationId) -> Result<Operation, OperationError> {
        self.update(id, Operation::skip)
    }

    /// Remove one operation unless it is running
    pub fn remove(&self, id: &OperationId) -> Result<Operation, OperationError> {
        let mut operations = self.operations.write();
        let index = operations
            .iter()
            .position(|op| &op.id == id)
            .ok_or_else(|| OperationError::NotFound(id.clone()))?;

        if !operations[index].is_deletable() {
            return Err(OperationError::Running(id.clone()));
        }
        Ok(operations.remove(index))
    }

    /// Remove every operation that is not running, returning how many went
    pub fn remove_all(&self) -> usize {
        let mut operations = self.operations.write();
        let before = operations.len();
        operations.retain(|op| !op.is_deletable());
        before - operations.len()
    }
}

impl Default for OperationStore {
    fn default() -> Self {
        Self::new()
    }
}
