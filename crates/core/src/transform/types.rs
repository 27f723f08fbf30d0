//! Types shared by the batch transform stages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::columnar::ColumnarError;
use crate::store::StoreError;

/// Errors that can occur while running a transform stage.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("columnar error: {0}")]
    Columnar(#[from] ColumnarError),

    #[error("malformed record in {key} line {line}: {reason}")]
    MalformedRecord {
        key: String,
        line: usize,
        reason: String,
    },

    #[error("execution engine error: {0}")]
    Engine(String),
}

/// What the clean stage does with raw records that fail validation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Skip the record and count it in the job report.
    #[default]
    Drop,
    /// Fail the whole job on the first malformed record.
    Abort,
}

/// How a stage's batch work is scheduled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEngine {
    /// Run parsing and encoding on the calling task.
    Inline,
    /// Run parsing and encoding on the blocking thread pool.
    #[default]
    Blocking,
}

impl ExecutionEngine {
    /// Returns the string representation for API responses and job records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionEngine::Inline => "inline",
            ExecutionEngine::Blocking => "blocking",
        }
    }
}

/// Invocation of one transform stage: input path, output path, and the
/// engine-selection flag. No other runtime configuration is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformJob {
    /// Key prefix the stage reads from.
    pub input_prefix: String,
    /// Key prefix the stage writes under.
    pub output_prefix: String,
    /// Engine-selection flag.
    #[serde(default)]
    pub engine: ExecutionEngine,
}

impl TransformJob {
    pub fn new(input_prefix: impl Into<String>, output_prefix: impl Into<String>) -> Self {
        Self {
            input_prefix: input_prefix.into(),
            output_prefix: output_prefix.into(),
            engine: ExecutionEngine::default(),
        }
    }

    pub fn with_engine(mut self, engine: ExecutionEngine) -> Self {
        self.engine = engine;
        self
    }
}

/// Outcome of a completed transform stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformReport {
    /// Records read from the input prefix.
    pub records_in: u64,
    /// Records written to the output prefix.
    pub records_out: u64,
    /// Records dropped under `MalformedPolicy::Drop`.
    pub records_dropped: u64,
    /// Keys of the objects written, in write order.
    pub output_keys: Vec<String>,
}

/// Run a CPU-bound closure according to the engine-selection flag.
pub(crate) async fn run_on_engine<T, F>(engine: ExecutionEngine, work: F) -> Result<T, TransformError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match engine {
        ExecutionEngine::Inline => Ok(work()),
        ExecutionEngine::Blocking => tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| TransformError::Engine(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_job_builder() {
        let job = TransformJob::new("raw/", "clean/").with_engine(ExecutionEngine::Inline);
        assert_eq!(job.input_prefix, "raw/");
        assert_eq!(job.output_prefix, "clean/");
        assert_eq!(job.engine, ExecutionEngine::Inline);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(MalformedPolicy::default(), MalformedPolicy::Drop);
        assert_eq!(ExecutionEngine::default(), ExecutionEngine::Blocking);
        assert_eq!(ExecutionEngine::Blocking.as_str(), "blocking");
    }

    #[test]
    fn test_policy_serialization() {
        assert_eq!(
            serde_json::to_string(&MalformedPolicy::Abort).unwrap(),
            "\"abort\""
        );
        assert_eq!(
            serde_json::to_string(&ExecutionEngine::Inline).unwrap(),
            "\"inline\""
        );
    }

    #[tokio::test]
    async fn test_run_on_engine_both_variants() {
        let inline = run_on_engine(ExecutionEngine::Inline, || 21 * 2).await.unwrap();
        let blocking = run_on_engine(ExecutionEngine::Blocking, || 21 * 2)
            .await
            .unwrap();
        assert_eq!(inline, 42);
        assert_eq!(blocking, 42);
    }
}
