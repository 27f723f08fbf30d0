//! Helpers for in-process API tests.

use std::sync::Arc;

use aqueduct_core::audit::AuditStore;
use aqueduct_core::job::{JobRunner, JobStore};
use aqueduct_core::testing::MockTrainingRuntime;
use aqueduct_core::workflow::{DatasetLocation, ExecutionStore, PipelineOrchestrator};
use aqueduct_core::{
    create_audit_system, Config, FsObjectStore, ObjectStore, SqliteAuditStore,
    SqliteExecutionStore, SqliteJobStore, TrainingRuntime,
};

use crate::state::AppState;

/// Build an AppState backed by temp stores, with no training runtime.
pub async fn build_state(customize: impl FnOnce(&mut Config)) -> Arc<AppState> {
    build_state_inner(customize, None).await
}

/// Build an AppState with an orchestrator driving the given mock runtime.
pub async fn build_state_with_runtime(
    runtime: Arc<MockTrainingRuntime>,
    customize: impl FnOnce(&mut Config),
) -> Arc<AppState> {
    build_state_inner(customize, Some(runtime)).await
}

async fn build_state_inner(
    customize: impl FnOnce(&mut Config),
    runtime: Option<Arc<MockTrainingRuntime>>,
) -> Arc<AppState> {
    let temp = tempfile::tempdir().expect("temp dir");
    let mut config: Config = aqueduct_core::load_config_from_str("").expect("default config");
    config.store.root = temp.path().join("store");
    config.transform.engine = aqueduct_core::transform::ExecutionEngine::Inline;
    customize(&mut config);

    let store = Arc::new(
        FsObjectStore::new(config.store.root.clone())
            .await
            .expect("object store"),
    );
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().expect("job store"));
    let executions: Arc<dyn ExecutionStore> =
        Arc::new(SqliteExecutionStore::in_memory().expect("execution store"));
    let audit_store: Arc<dyn AuditStore> =
        Arc::new(SqliteAuditStore::in_memory().expect("audit store"));

    let (audit_handle, writer) = create_audit_system(Arc::clone(&audit_store), 100);
    tokio::spawn(writer.run());

    let runner = Arc::new(
        JobRunner::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&jobs),
            config.transform.clone(),
        )
        .with_audit(audit_handle.clone()),
    );

    let orchestrator = runtime.map(|runtime| {
        let mut orchestrator_config = config.orchestrator.clone();
        orchestrator_config.poll_interval_ms = 20;
        Arc::new(
            PipelineOrchestrator::new(
                orchestrator_config,
                Arc::clone(&executions),
                runtime as Arc<dyn TrainingRuntime>,
                DatasetLocation::new(store.root().display().to_string()),
            )
            .with_audit(audit_handle.clone()),
        )
    });

    // Keep the temp dir alive for the lifetime of the test process.
    std::mem::forget(temp);

    Arc::new(AppState::new(
        config,
        store,
        jobs,
        executions,
        audit_handle,
        audit_store,
        runner,
        orchestrator,
    ))
}
