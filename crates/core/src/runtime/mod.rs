//! Training/hosting runtime abstraction.
//!
//! The runtime that actually trains models and serves endpoints is an
//! external service, reached over HTTP. This module provides a
//! `TrainingRuntime` trait for the operations the workflow needs, and the
//! REST client backend.

mod http;
mod types;

pub use http::HttpTrainingRuntime;
pub use types::*;
