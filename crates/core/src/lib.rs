pub mod audit;
pub mod config;
pub mod dataset;
pub mod job;
pub mod metrics;
pub mod notifier;
pub mod runtime;
pub mod store;
pub mod testing;
pub mod transform;
pub mod workflow;

pub use audit::{
    create_audit_system, AuditEvent, AuditFilter, AuditHandle, AuditStore, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use job::{ChainTrigger, JobFilter, JobRunner, JobStore, SqliteJobStore};
pub use notifier::ChangeNotifier;
pub use runtime::{HttpTrainingRuntime, TrainingRuntime};
pub use store::{FsObjectStore, ObjectStore};
pub use workflow::{
    DatasetLocation, ExecutionFilter, ExecutionStore, OrchestratorConfig, PipelineOrchestrator,
    SqliteExecutionStore,
};
