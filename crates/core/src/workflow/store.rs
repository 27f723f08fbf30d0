//! Execution storage trait and types.

use thiserror::Error;

use super::types::{Execution, ExecutionState};

/// Error type for execution storage operations.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Execution not found.
    #[error("execution not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Filter for querying executions.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    /// Filter by state type ("train", "succeeded", ...).
    pub state: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl ExecutionFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            state: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by state type.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for execution storage backends.
pub trait ExecutionStore: Send + Sync {
    /// Create a new execution in the initial state.
    fn create(&self) -> Result<Execution, ExecutionError>;

    /// Get an execution by ID.
    fn get(&self, id: &str) -> Result<Option<Execution>, ExecutionError>;

    /// List executions matching the filter, newest first.
    fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, ExecutionError>;

    /// Count executions matching the filter.
    fn count(&self, filter: &ExecutionFilter) -> Result<i64, ExecutionError>;

    /// Update an execution's state.
    fn update_state(&self, id: &str, new_state: ExecutionState)
        -> Result<Execution, ExecutionError>;
}
