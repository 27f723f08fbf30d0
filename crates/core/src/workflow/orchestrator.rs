//! Pipeline orchestrator implementation.
//!
//! Consumes start signals and drives each resulting execution through the
//! four ordered steps. Executions are independent tasks; several may run at
//! once when signals arrive close together, and all of them deploy to the
//! same fixed endpoint name (last deploy wins).

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics;
use crate::runtime::{
    EndpointConfigSpec, EndpointSpec, ModelSpec, TrainingJobSpec, TrainingJobStatus,
    TrainingRuntime, VariantSpec,
};

use super::config::OrchestratorConfig;
use super::store::{ExecutionFilter, ExecutionStore};
use super::types::{
    DatasetLocation, Execution, ExecutionState, StartSignal, StepOutcome, WorkflowError,
};

/// Capacity of the start-signal channel.
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Fixed training hyperparameters. Every execution trains with these.
fn fixed_hyperparameters() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("objective".to_string(), "reg:squarederror".to_string()),
        ("num_round".to_string(), "10".to_string()),
    ])
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the signal loop is running.
    pub running: bool,
    /// Executions currently being driven by this process.
    pub active_executions: usize,
    /// Executions that reached `succeeded`.
    pub succeeded_count: usize,
    /// Executions that reached `failed`.
    pub failed_count: usize,
}

/// Everything one execution task needs.
#[derive(Clone)]
struct ExecutionContext {
    config: OrchestratorConfig,
    executions: Arc<dyn ExecutionStore>,
    runtime: Arc<dyn TrainingRuntime>,
    dataset: DatasetLocation,
    audit: Option<AuditHandle>,
    active: Arc<RwLock<HashSet<String>>>,
}

/// The pipeline orchestrator - drives executions through the state machine.
pub struct PipelineOrchestrator {
    context: ExecutionContext,
    running: Arc<AtomicBool>,
    signal_tx: mpsc::Sender<StartSignal>,
    signal_rx: std::sync::Mutex<Option<mpsc::Receiver<StartSignal>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        executions: Arc<dyn ExecutionStore>,
        runtime: Arc<dyn TrainingRuntime>,
        dataset: DatasetLocation,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            context: ExecutionContext {
                config,
                executions,
                runtime,
                dataset,
                audit: None,
                active: Arc::new(RwLock::new(HashSet::new())),
            },
            running: Arc::new(AtomicBool::new(false)),
            signal_tx,
            signal_rx: std::sync::Mutex::new(Some(signal_rx)),
            shutdown_tx,
        }
    }

    /// Sets the audit handle for logging events.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.context.audit = Some(audit);
        self
    }

    /// Sender half of the start-signal channel; hand this to the change
    /// notifier.
    pub fn signal_sender(&self) -> mpsc::Sender<StartSignal> {
        self.signal_tx.clone()
    }

    /// Start the signal loop (spawns a background task).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        let Some(mut signal_rx) = self.signal_rx.lock().unwrap().take() else {
            warn!("Orchestrator signal receiver already consumed");
            self.running.store(false, Ordering::SeqCst);
            return;
        };

        info!("Starting pipeline orchestrator");

        let context = self.context.clone();
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Signal loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Signal loop received shutdown signal");
                        break;
                    }
                    signal = signal_rx.recv() => {
                        let Some(signal) = signal else {
                            info!("Signal channel closed");
                            break;
                        };
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        debug!(received_at = %signal.received_at, "Start signal received");
                        if let Err(e) = Self::spawn_execution(&context).await {
                            warn!("Failed to start execution: {}", e);
                        }
                    }
                }
            }
            info!("Signal loop stopped");
        });

        info!("Pipeline orchestrator started");
    }

    /// Stop the orchestrator gracefully. In-flight executions run to their
    /// terminal state; only the signal loop stops.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping pipeline orchestrator");
        let _ = self.shutdown_tx.send(());
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let active_executions = self.context.active.read().await.len();

        let succeeded_count = self
            .context
            .executions
            .count(&ExecutionFilter::new().with_state("succeeded"))
            .unwrap_or(0) as usize;

        let failed_count = self
            .context
            .executions
            .count(&ExecutionFilter::new().with_state("failed"))
            .unwrap_or(0) as usize;

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            active_executions,
            succeeded_count,
            failed_count,
        }
    }

    /// Start a new execution immediately, outside the signal loop. This is
    /// the operator's manual entry point.
    pub async fn start_execution(&self) -> Result<Execution, WorkflowError> {
        Self::spawn_execution(&self.context).await
    }

    /// Create an execution and spawn its driver task.
    async fn spawn_execution(context: &ExecutionContext) -> Result<Execution, WorkflowError> {
        let execution = context.executions.create()?;
        info!(execution_id = %execution.id, "Execution started");

        if let Some(ref audit) = context.audit {
            audit
                .emit(AuditEvent::ExecutionStarted {
                    execution_id: execution.id.clone(),
                })
                .await;
        }

        context.active.write().await.insert(execution.id.clone());

        let task_context = context.clone();
        let execution_id = execution.id.clone();
        let initial_state = execution.state.clone();
        tokio::spawn(async move {
            Self::drive_execution(task_context, execution_id, initial_state).await;
        });

        Ok(execution)
    }

    /// Walk one execution through the state machine until terminal.
    async fn drive_execution(
        context: ExecutionContext,
        execution_id: String,
        mut state: ExecutionState,
    ) {
        while !state.is_terminal() {
            let step = state.state_type();
            let step_start = Instant::now();

            let outcome = match &state {
                ExecutionState::Train { .. } => {
                    Self::run_train_step(&context, &execution_id).await
                }
                ExecutionState::RegisterModel { artifact_location } => {
                    Self::run_register_step(&context, &execution_id, artifact_location).await
                }
                ExecutionState::ConfigureHosting { model_id, .. } => {
                    Self::run_configure_step(&context, &execution_id, model_id).await
                }
                ExecutionState::DeployEndpoint { config_id, .. } => {
                    Self::run_deploy_step(&context, &execution_id, config_id).await
                }
                // Terminal states never reach here.
                _ => break,
            };

            metrics::EXECUTION_STEP_DURATION
                .with_label_values(&[step])
                .observe(step_start.elapsed().as_secs_f64());

            let next = match state.advance(outcome) {
                Ok(next) => next,
                Err(e) => {
                    error!(execution_id = %execution_id, "Invalid transition: {}", e);
                    break;
                }
            };

            let reason = match &next {
                ExecutionState::Failed { error, .. } => Some(error.clone()),
                _ => None,
            };

            if let Err(e) = context
                .executions
                .update_state(&execution_id, next.clone())
            {
                error!(execution_id = %execution_id, "Failed to persist state: {}", e);
                break;
            }

            if let Some(ref audit) = context.audit {
                audit
                    .emit(AuditEvent::ExecutionStateChanged {
                        execution_id: execution_id.clone(),
                        from_state: step.to_string(),
                        to_state: next.state_type().to_string(),
                        reason,
                    })
                    .await;
            }

            state = next;
        }

        match &state {
            ExecutionState::Succeeded { endpoint_name, .. } => {
                metrics::EXECUTIONS_TOTAL
                    .with_label_values(&["succeeded"])
                    .inc();
                info!(execution_id = %execution_id, endpoint = %endpoint_name, "Execution succeeded");
            }
            ExecutionState::Failed { at_step, error, .. } => {
                metrics::EXECUTIONS_TOTAL.with_label_values(&["failed"]).inc();
                warn!(
                    execution_id = %execution_id,
                    at_step = %at_step,
                    error = %error,
                    "Execution failed"
                );
            }
            _ => {}
        }

        context.active.write().await.remove(&execution_id);
    }

    /// TRAIN: submit a training job against the current aggregated dataset
    /// and block until it reaches a terminal status or the runtime bound.
    async fn run_train_step(context: &ExecutionContext, execution_id: &str) -> StepOutcome {
        let spec = TrainingJobSpec {
            input_location: context.dataset.aggregated(),
            artifact_location: context.dataset.artifacts(execution_id),
            image: context.config.training_image.clone(),
            instance_type: context.config.training_instance_type.clone(),
            instance_count: 1,
            max_runtime_secs: context.config.max_training_runtime_secs,
            hyperparameters: fixed_hyperparameters(),
        };

        let training_job_id = match context.runtime.submit_training_job(spec).await {
            Ok(id) => id,
            Err(e) => {
                return StepOutcome::StepFailed {
                    error: format!("training submission failed: {e}"),
                }
            }
        };

        info!(
            execution_id = %execution_id,
            training_job_id = %training_job_id,
            "Training job submitted"
        );

        if let Some(ref audit) = context.audit {
            audit
                .emit(AuditEvent::TrainingJobSubmitted {
                    execution_id: execution_id.to_string(),
                    training_job_id: training_job_id.clone(),
                    input_prefix: context.dataset.aggregated(),
                    max_runtime_secs: context.config.max_training_runtime_secs,
                })
                .await;
        }

        // Record the runtime job id on the execution for operators.
        if let Ok(Some(execution)) = context.executions.get(execution_id) {
            if let ExecutionState::Train { started_at, .. } = execution.state {
                let _ = context.executions.update_state(
                    execution_id,
                    ExecutionState::Train {
                        started_at,
                        training_job_id: Some(training_job_id.clone()),
                    },
                );
            }
        }

        let deadline =
            Instant::now() + Duration::from_secs(context.config.max_training_runtime_secs);
        let poll_interval = Duration::from_millis(context.config.poll_interval_ms);

        loop {
            tokio::time::sleep(poll_interval).await;

            match context.runtime.describe_training_job(&training_job_id).await {
                Ok(TrainingJobStatus::Completed { artifact_location }) => {
                    return StepOutcome::TrainSucceeded { artifact_location };
                }
                Ok(TrainingJobStatus::Failed { reason }) => {
                    return StepOutcome::StepFailed {
                        error: format!("training failed: {reason}"),
                    };
                }
                Ok(TrainingJobStatus::Stopped) => {
                    return StepOutcome::StepFailed {
                        error: "training stopped externally".to_string(),
                    };
                }
                Ok(TrainingJobStatus::InProgress) => {}
                Err(e) => {
                    // Transient describe failures are tolerated; the
                    // deadline bounds the loop.
                    warn!(
                        training_job_id = %training_job_id,
                        "Failed to describe training job: {}", e
                    );
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    execution_id = %execution_id,
                    training_job_id = %training_job_id,
                    "Training exceeded maximum runtime, stopping"
                );
                if let Err(e) = context.runtime.stop_training_job(&training_job_id).await {
                    warn!(training_job_id = %training_job_id, "Failed to stop training job: {}", e);
                }
                return StepOutcome::StepFailed {
                    error: format!(
                        "training exceeded maximum runtime of {}s",
                        context.config.max_training_runtime_secs
                    ),
                };
            }
        }
    }

    /// REGISTER_MODEL: create a named model referencing the artifact.
    async fn run_register_step(
        context: &ExecutionContext,
        execution_id: &str,
        artifact_location: &str,
    ) -> StepOutcome {
        let spec = ModelSpec {
            name: format!("aqueduct-model-{execution_id}"),
            artifact_location: artifact_location.to_string(),
            image: context.config.training_image.clone(),
        };

        match context.runtime.create_model(spec).await {
            Ok(model_id) => {
                if let Some(ref audit) = context.audit {
                    audit
                        .emit(AuditEvent::ModelRegistered {
                            execution_id: execution_id.to_string(),
                            model_id: model_id.clone(),
                            artifact_location: artifact_location.to_string(),
                        })
                        .await;
                }
                StepOutcome::ModelRegistered { model_id }
            }
            Err(e) => StepOutcome::StepFailed {
                error: format!("model registration failed: {e}"),
            },
        }
    }

    /// CONFIGURE_HOSTING: single variant, full traffic weight, single
    /// instance.
    async fn run_configure_step(
        context: &ExecutionContext,
        execution_id: &str,
        model_id: &str,
    ) -> StepOutcome {
        let spec = EndpointConfigSpec {
            name: format!("aqueduct-config-{execution_id}"),
            model_id: model_id.to_string(),
            variants: vec![VariantSpec {
                name: "primary".to_string(),
                instance_type: context.config.hosting_instance_type.clone(),
                instance_count: 1,
                traffic_weight: 1.0,
            }],
        };

        match context.runtime.create_endpoint_config(spec).await {
            Ok(config_id) => StepOutcome::HostingConfigured { config_id },
            Err(e) => StepOutcome::StepFailed {
                error: format!("hosting configuration failed: {e}"),
            },
        }
    }

    /// DEPLOY_ENDPOINT: create-or-update the fixed-name endpoint. A second
    /// execution overwrites the existing endpoint; latest model wins.
    async fn run_deploy_step(
        context: &ExecutionContext,
        execution_id: &str,
        config_id: &str,
    ) -> StepOutcome {
        let spec = EndpointSpec {
            name: context.config.endpoint_name.clone(),
            config_id: config_id.to_string(),
        };

        match context.runtime.deploy_endpoint(spec).await {
            Ok(info) => {
                metrics::ENDPOINT_DEPLOYS_TOTAL.inc();
                if let Some(ref audit) = context.audit {
                    audit
                        .emit(AuditEvent::EndpointDeployed {
                            execution_id: execution_id.to_string(),
                            endpoint_name: info.name.clone(),
                            config_id: config_id.to_string(),
                        })
                        .await;
                }
                StepOutcome::EndpointDeployed {
                    endpoint_name: info.name,
                }
            }
            Err(e) => StepOutcome::StepFailed {
                error: format!("endpoint deployment failed: {e}"),
            },
        }
    }
}
