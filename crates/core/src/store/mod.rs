//! Object store abstraction.
//!
//! All pipeline data lives under a single store root, organized by fixed key
//! prefixes. Everything upstream and downstream reads and writes through the
//! `ObjectStore` trait; the filesystem implementation additionally publishes
//! object-creation events so watchers can react without polling.

mod fs;
mod types;

pub use fs::FsObjectStore;
pub use types::*;

/// Prefix for raw ingested records.
pub const RAW_PREFIX: &str = "raw/";

/// Prefix for validated, normalized records.
pub const CLEAN_PREFIX: &str = "clean/";

/// Prefix for windowed aggregate records.
pub const AGGREGATED_PREFIX: &str = "aggregated/";

/// Prefix for operator-supplied scripts and job assets.
pub const SCRIPTS_PREFIX: &str = "scripts/";

/// Prefix for trained model artifacts.
pub const MODEL_ARTIFACTS_PREFIX: &str = "model-artifacts/";

/// All fixed prefixes, in pipeline order.
pub const ALL_PREFIXES: [&str; 5] = [
    RAW_PREFIX,
    CLEAN_PREFIX,
    AGGREGATED_PREFIX,
    SCRIPTS_PREFIX,
    MODEL_ARTIFACTS_PREFIX,
];
