//! Batch transform stages.
//!
//! Two linear batch jobs move data through the store: the clean stage
//! (raw -> clean) and the aggregate stage (clean -> aggregated). Each job
//! reads everything under its input prefix, runs to completion, and writes
//! its output last so a failed job never promotes partial output.

mod aggregate;
mod clean;
mod types;

pub use aggregate::AggregateTransform;
pub use clean::CleanTransform;
pub use types::*;
