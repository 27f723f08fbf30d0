//! Mock training/hosting runtime for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::runtime::{
    EndpointConfigSpec, EndpointInfo, EndpointSpec, EndpointStatus, ModelSpec, RuntimeError,
    TrainingJobSpec, TrainingJobStatus, TrainingRuntime,
};

/// A recorded endpoint deployment for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDeploy {
    /// The deployment that was requested.
    pub spec: EndpointSpec,
    /// When the request was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// How submitted training jobs behave.
#[derive(Debug, Clone)]
pub enum TrainingMode {
    /// Jobs complete on the first describe, with the artifact location the
    /// spec asked for.
    AutoComplete,
    /// Jobs fail on the first describe.
    AutoFail { reason: String },
    /// Jobs stay in progress until moved with `complete_job`/`fail_job` (or
    /// until stopped).
    Manual,
}

/// Mock implementation of the TrainingRuntime trait.
///
/// Provides controllable behavior for testing:
/// - Track submitted jobs and deployments for assertions
/// - Control training outcomes (auto-complete, auto-fail, manual)
/// - Inject errors per operation
///
/// # Example
///
/// ```rust,ignore
/// let runtime = MockTrainingRuntime::new();
///
/// // Make every training job fail
/// runtime.set_training_mode(TrainingMode::AutoFail { reason: "oom".into() }).await;
///
/// // Or fail a specific operation
/// runtime.set_create_model_error(RuntimeError::Timeout).await;
///
/// // Inspect what happened
/// assert_eq!(runtime.deployed_endpoints().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTrainingRuntime {
    submitted: Arc<RwLock<Vec<TrainingJobSpec>>>,
    jobs: Arc<RwLock<HashMap<String, TrainingJobStatus>>>,
    job_specs: Arc<RwLock<HashMap<String, TrainingJobSpec>>>,
    models: Arc<RwLock<HashMap<String, ModelSpec>>>,
    configs: Arc<RwLock<HashMap<String, EndpointConfigSpec>>>,
    /// Live endpoints keyed by name. Deploying an existing name replaces it.
    endpoints: Arc<RwLock<HashMap<String, EndpointInfo>>>,
    deploys: Arc<RwLock<Vec<RecordedDeploy>>>,
    mode: Arc<RwLock<Option<TrainingMode>>>,
    submit_error: Arc<RwLock<Option<RuntimeError>>>,
    create_model_error: Arc<RwLock<Option<RuntimeError>>>,
    create_config_error: Arc<RwLock<Option<RuntimeError>>>,
    deploy_error: Arc<RwLock<Option<RuntimeError>>>,
    counter: Arc<RwLock<u32>>,
}

impl MockTrainingRuntime {
    /// Create a new mock runtime in auto-complete mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how submitted training jobs behave.
    pub async fn set_training_mode(&self, mode: TrainingMode) {
        *self.mode.write().await = Some(mode);
    }

    /// Fail the next training job submission with the given error.
    pub async fn set_submit_error(&self, error: RuntimeError) {
        *self.submit_error.write().await = Some(error);
    }

    /// Fail the next model registration with the given error.
    pub async fn set_create_model_error(&self, error: RuntimeError) {
        *self.create_model_error.write().await = Some(error);
    }

    /// Fail the next endpoint-config creation with the given error.
    pub async fn set_create_config_error(&self, error: RuntimeError) {
        *self.create_config_error.write().await = Some(error);
    }

    /// Fail the next endpoint deployment with the given error.
    pub async fn set_deploy_error(&self, error: RuntimeError) {
        *self.deploy_error.write().await = Some(error);
    }

    /// Move a manual-mode job to completed.
    pub async fn complete_job(&self, job_id: &str, artifact_location: impl Into<String>) {
        self.jobs.write().await.insert(
            job_id.to_string(),
            TrainingJobStatus::Completed {
                artifact_location: artifact_location.into(),
            },
        );
    }

    /// Move a manual-mode job to failed.
    pub async fn fail_job(&self, job_id: &str, reason: impl Into<String>) {
        self.jobs.write().await.insert(
            job_id.to_string(),
            TrainingJobStatus::Failed {
                reason: reason.into(),
            },
        );
    }

    /// All submitted training job specs, in order.
    pub async fn submitted_jobs(&self) -> Vec<TrainingJobSpec> {
        self.submitted.read().await.clone()
    }

    /// All endpoint deployments, in order.
    pub async fn deployed_endpoints(&self) -> Vec<RecordedDeploy> {
        self.deploys.read().await.clone()
    }

    /// The live endpoint with the given name, if any.
    pub async fn endpoint(&self, name: &str) -> Option<EndpointInfo> {
        self.endpoints.read().await.get(name).cloned()
    }

    /// Number of distinct live endpoints.
    pub async fn endpoint_count(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// Number of registered models.
    pub async fn model_count(&self) -> usize {
        self.models.read().await.len()
    }

    /// Whether a training job was asked to stop.
    pub async fn job_stopped(&self, job_id: &str) -> bool {
        matches!(
            self.jobs.read().await.get(job_id),
            Some(TrainingJobStatus::Stopped)
        )
    }

    async fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counter.write().await;
        *counter += 1;
        format!("{prefix}-{:04}", *counter)
    }

    async fn take(slot: &Arc<RwLock<Option<RuntimeError>>>) -> Option<RuntimeError> {
        slot.write().await.take()
    }
}

#[async_trait]
impl TrainingRuntime for MockTrainingRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit_training_job(&self, spec: TrainingJobSpec) -> Result<String, RuntimeError> {
        if let Some(err) = Self::take(&self.submit_error).await {
            return Err(err);
        }

        let job_id = self.next_id("training-job").await;
        self.submitted.write().await.push(spec.clone());
        self.job_specs
            .write()
            .await
            .insert(job_id.clone(), spec);
        self.jobs
            .write()
            .await
            .insert(job_id.clone(), TrainingJobStatus::InProgress);
        Ok(job_id)
    }

    async fn describe_training_job(
        &self,
        job_id: &str,
    ) -> Result<TrainingJobStatus, RuntimeError> {
        let current = self
            .jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(job_id.to_string()))?;

        // A terminal status sticks regardless of mode.
        if current.is_terminal() {
            return Ok(current);
        }

        let mode = self
            .mode
            .read()
            .await
            .clone()
            .unwrap_or(TrainingMode::AutoComplete);
        let status = match mode {
            TrainingMode::AutoComplete => {
                let artifact_location = self
                    .job_specs
                    .read()
                    .await
                    .get(job_id)
                    .map(|spec| format!("{}model.bin", spec.artifact_location))
                    .unwrap_or_default();
                TrainingJobStatus::Completed { artifact_location }
            }
            TrainingMode::AutoFail { reason } => TrainingJobStatus::Failed { reason },
            TrainingMode::Manual => TrainingJobStatus::InProgress,
        };

        if status.is_terminal() {
            self.jobs
                .write()
                .await
                .insert(job_id.to_string(), status.clone());
        }

        Ok(status)
    }

    async fn stop_training_job(&self, job_id: &str) -> Result<(), RuntimeError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get(job_id) {
            Some(status) if !status.is_terminal() => {
                jobs.insert(job_id.to_string(), TrainingJobStatus::Stopped);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(RuntimeError::NotFound(job_id.to_string())),
        }
    }

    async fn create_model(&self, spec: ModelSpec) -> Result<String, RuntimeError> {
        if let Some(err) = Self::take(&self.create_model_error).await {
            return Err(err);
        }

        let model_id = self.next_id("model").await;
        self.models.write().await.insert(model_id.clone(), spec);
        Ok(model_id)
    }

    async fn create_endpoint_config(
        &self,
        spec: EndpointConfigSpec,
    ) -> Result<String, RuntimeError> {
        if let Some(err) = Self::take(&self.create_config_error).await {
            return Err(err);
        }

        let config_id = self.next_id("endpoint-config").await;
        self.configs.write().await.insert(config_id.clone(), spec);
        Ok(config_id)
    }

    async fn deploy_endpoint(&self, spec: EndpointSpec) -> Result<EndpointInfo, RuntimeError> {
        if let Some(err) = Self::take(&self.deploy_error).await {
            return Err(err);
        }

        // Hold both locks so the recorded order matches the endpoint's final
        // configuration under concurrent deploys.
        let mut deploys = self.deploys.write().await;
        let mut endpoints = self.endpoints.write().await;

        deploys.push(RecordedDeploy {
            spec: spec.clone(),
            timestamp: Utc::now(),
        });

        let info = EndpointInfo {
            name: spec.name.clone(),
            config_id: spec.config_id.clone(),
            status: EndpointStatus::InService,
            updated_at: Utc::now(),
        };
        // Create-or-update: one entry per name, last deploy wins.
        endpoints.insert(spec.name, info.clone());
        Ok(info)
    }

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointInfo, RuntimeError> {
        self.endpoints
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec() -> TrainingJobSpec {
        TrainingJobSpec {
            input_location: "data/aggregated/".to_string(),
            artifact_location: "data/model-artifacts/exec-1/".to_string(),
            image: "aqueduct/xgboost:latest".to_string(),
            instance_type: "small-1x".to_string(),
            instance_count: 1,
            max_runtime_secs: 600,
            hyperparameters: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_auto_complete_mode() {
        let runtime = MockTrainingRuntime::new();

        let job_id = runtime.submit_training_job(spec()).await.unwrap();
        let status = runtime.describe_training_job(&job_id).await.unwrap();

        match status {
            TrainingJobStatus::Completed { artifact_location } => {
                assert_eq!(artifact_location, "data/model-artifacts/exec-1/model.bin");
            }
            other => panic!("Expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auto_fail_mode() {
        let runtime = MockTrainingRuntime::new();
        runtime
            .set_training_mode(TrainingMode::AutoFail {
                reason: "oom".to_string(),
            })
            .await;

        let job_id = runtime.submit_training_job(spec()).await.unwrap();
        let status = runtime.describe_training_job(&job_id).await.unwrap();
        assert!(matches!(status, TrainingJobStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_manual_mode_and_stop() {
        let runtime = MockTrainingRuntime::new();
        runtime.set_training_mode(TrainingMode::Manual).await;

        let job_id = runtime.submit_training_job(spec()).await.unwrap();
        assert_eq!(
            runtime.describe_training_job(&job_id).await.unwrap(),
            TrainingJobStatus::InProgress
        );

        runtime.stop_training_job(&job_id).await.unwrap();
        assert_eq!(
            runtime.describe_training_job(&job_id).await.unwrap(),
            TrainingJobStatus::Stopped
        );
        assert!(runtime.job_stopped(&job_id).await);
    }

    #[tokio::test]
    async fn test_deploy_is_create_or_update() {
        let runtime = MockTrainingRuntime::new();

        runtime
            .deploy_endpoint(EndpointSpec {
                name: "aqueduct-latest".to_string(),
                config_id: "cfg-1".to_string(),
            })
            .await
            .unwrap();
        runtime
            .deploy_endpoint(EndpointSpec {
                name: "aqueduct-latest".to_string(),
                config_id: "cfg-2".to_string(),
            })
            .await
            .unwrap();

        // Two deploys, one endpoint, last config wins.
        assert_eq!(runtime.deployed_endpoints().await.len(), 2);
        assert_eq!(runtime.endpoint_count().await, 1);
        let endpoint = runtime.endpoint("aqueduct-latest").await.unwrap();
        assert_eq!(endpoint.config_id, "cfg-2");
    }

    #[tokio::test]
    async fn test_error_injection_is_consumed() {
        let runtime = MockTrainingRuntime::new();
        runtime.set_submit_error(RuntimeError::Timeout).await;

        assert!(runtime.submit_training_job(spec()).await.is_err());
        assert!(runtime.submit_training_job(spec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_describe_unknown_job() {
        let runtime = MockTrainingRuntime::new();
        let result = runtime.describe_training_job("nope").await;
        assert!(matches!(result, Err(RuntimeError::NotFound(_))));
    }
}
