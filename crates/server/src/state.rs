use std::sync::Arc;

use aqueduct_core::audit::{AuditHandle, AuditStore};
use aqueduct_core::job::{JobRunner, JobStore};
use aqueduct_core::store::FsObjectStore;
use aqueduct_core::workflow::{ExecutionStore, PipelineOrchestrator};
use aqueduct_core::{Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<FsObjectStore>,
    jobs: Arc<dyn JobStore>,
    executions: Arc<dyn ExecutionStore>,
    audit_handle: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    runner: Arc<JobRunner>,
    orchestrator: Option<Arc<PipelineOrchestrator>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: Arc<FsObjectStore>,
        jobs: Arc<dyn JobStore>,
        executions: Arc<dyn ExecutionStore>,
        audit_handle: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        runner: Arc<JobRunner>,
        orchestrator: Option<Arc<PipelineOrchestrator>>,
    ) -> Self {
        Self {
            config,
            store,
            jobs,
            executions,
            audit_handle,
            audit_store,
            runner,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &FsObjectStore {
        &self.store
    }

    pub fn jobs(&self) -> &dyn JobStore {
        self.jobs.as_ref()
    }

    pub fn executions(&self) -> &dyn ExecutionStore {
        self.executions.as_ref()
    }

    pub fn audit_handle(&self) -> &AuditHandle {
        &self.audit_handle
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub fn orchestrator(&self) -> Option<&Arc<PipelineOrchestrator>> {
        self.orchestrator.as_ref()
    }
}
