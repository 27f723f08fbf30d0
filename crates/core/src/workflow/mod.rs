//! Pipeline workflow: the train -> register -> configure -> deploy state
//! machine.
//!
//! Each start signal spawns an independent execution that walks the four
//! steps in order, threading every step's output into the next. Transitions
//! are a pure function over [`ExecutionState`], so the machine is testable
//! without the training runtime.

mod config;
mod orchestrator;
mod sqlite_store;
mod store;
mod types;

pub use config::OrchestratorConfig;
pub use orchestrator::{OrchestratorStatus, PipelineOrchestrator};
pub use sqlite_store::SqliteExecutionStore;
pub use store::{ExecutionError, ExecutionFilter, ExecutionStore};
pub use types::*;
