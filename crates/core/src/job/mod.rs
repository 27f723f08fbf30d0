//! Batch job tracking and chaining.
//!
//! Every transform stage invocation is recorded as a [`JobRun`] with a
//! terminal status. The [`ChainTrigger`] watches completed clean runs and
//! starts the aggregate stage when, and only when, the upstream run
//! succeeded.

mod chain;
mod runner;
mod sqlite_store;
mod store;
mod types;

pub use chain::{ChainTrigger, TriggerDecision, TriggerState};
pub use runner::JobRunner;
pub use sqlite_store::SqliteJobStore;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{JobKind, JobRun, JobStatus};
