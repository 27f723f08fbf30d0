//! Batch job run data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transform::{TransformJob, TransformReport};

/// Which transform stage a job run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Stage 1: raw -> clean.
    Clean,
    /// Stage 2: clean -> aggregated.
    Aggregate,
}

impl JobKind {
    /// Returns the string representation for API responses and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Clean => "clean",
            JobKind::Aggregate => "aggregate",
        }
    }
}

/// Status of a job run. `Running` is the only non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    /// Stopped externally before reaching its own terminal status.
    Stopped,
}

impl JobStatus {
    /// Returns the string representation for API responses and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One recorded invocation of a transform stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    /// The invocation: input path, output path, engine flag.
    pub job: TransformJob,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Present on succeeded runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TransformReport>,
    /// Present on failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
