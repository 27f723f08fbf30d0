//! Pipeline data model.
//!
//! Three record shapes flow through the store: raw readings as ingested,
//! cleaned readings with validated types, and fixed-window aggregates. The
//! `columnar` submodule holds the Arrow encodings for the clean and
//! aggregated datasets.

pub mod columnar;
mod types;

pub use types::*;
