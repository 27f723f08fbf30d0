//! Job run storage trait and types.

use thiserror::Error;

use crate::transform::{TransformJob, TransformReport};

use super::types::{JobKind, JobRun, JobStatus};

/// Error type for job run operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job run not found.
    #[error("job run not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Filter for querying job runs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Filter by stage kind.
    pub kind: Option<JobKind>,
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            kind: None,
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by stage kind.
    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
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

/// Trait for job run storage backends.
pub trait JobStore: Send + Sync {
    /// Record the start of a stage invocation; the run begins `Running`.
    fn create(&self, kind: JobKind, job: TransformJob) -> Result<JobRun, JobError>;

    /// Get a job run by ID.
    fn get(&self, id: &str) -> Result<Option<JobRun>, JobError>;

    /// List job runs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRun>, JobError>;

    /// Count job runs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Record a run's terminal status.
    fn finish(
        &self,
        id: &str,
        status: JobStatus,
        report: Option<TransformReport>,
        error: Option<String>,
    ) -> Result<JobRun, JobError>;
}
