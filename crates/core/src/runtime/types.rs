//! Types for training/hosting runtime operations.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur talking to the training/hosting runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specification of one training job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJobSpec {
    /// Store location the trainer reads its dataset from.
    pub input_location: String,
    /// Store location the trainer writes the model artifact under.
    pub artifact_location: String,
    /// Training image reference (externally supplied).
    pub image: String,
    /// Instance type for the single training instance.
    pub instance_type: String,
    /// Number of training instances.
    pub instance_count: u32,
    /// Hard bound on the job's runtime; the runtime force-stops past it.
    pub max_runtime_secs: u64,
    /// Algorithm hyperparameters, passed through verbatim.
    pub hyperparameters: BTreeMap<String, String>,
}

/// Status of a submitted training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainingJobStatus {
    InProgress,
    Completed {
        /// Where the trained artifact landed.
        artifact_location: String,
    },
    Failed {
        reason: String,
    },
    Stopped,
}

impl TrainingJobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrainingJobStatus::InProgress)
    }
}

/// Specification for registering a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name; the runtime returns a unique model id.
    pub name: String,
    /// Artifact location captured from the training step.
    pub artifact_location: String,
    /// Serving image reference.
    pub image: String,
}

/// One serving variant within an endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    pub instance_type: String,
    pub instance_count: u32,
    /// Fraction of traffic routed to this variant.
    pub traffic_weight: f32,
}

/// Specification for a hosting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfigSpec {
    pub name: String,
    pub model_id: String,
    pub variants: Vec<VariantSpec>,
}

/// Specification for deploying (creating or updating) an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Endpoint name. Deploying to an existing name updates it in place.
    pub name: String,
    pub config_id: String,
}

/// Status of a live endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Creating,
    Updating,
    InService,
    Failed,
}

/// Information about a live endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub name: String,
    /// Hosting configuration currently backing the endpoint.
    pub config_id: String,
    pub status: EndpointStatus,
    pub updated_at: DateTime<Utc>,
}

/// Trait for training/hosting runtime backends.
#[async_trait]
pub trait TrainingRuntime: Send + Sync {
    /// Backend name for logging/audit.
    fn name(&self) -> &str;

    /// Submit a training job. Returns the runtime's job id.
    async fn submit_training_job(&self, spec: TrainingJobSpec) -> Result<String, RuntimeError>;

    /// Current status of a training job.
    async fn describe_training_job(&self, job_id: &str)
        -> Result<TrainingJobStatus, RuntimeError>;

    /// Force-stop a training job.
    async fn stop_training_job(&self, job_id: &str) -> Result<(), RuntimeError>;

    /// Register a trained model. Returns the model id.
    async fn create_model(&self, spec: ModelSpec) -> Result<String, RuntimeError>;

    /// Create a hosting configuration. Returns the config id.
    async fn create_endpoint_config(
        &self,
        spec: EndpointConfigSpec,
    ) -> Result<String, RuntimeError>;

    /// Create or update a named endpoint. Deploying to an existing name
    /// replaces its configuration; the last deploy wins.
    async fn deploy_endpoint(&self, spec: EndpointSpec) -> Result<EndpointInfo, RuntimeError>;

    /// Describe a live endpoint.
    async fn describe_endpoint(&self, name: &str) -> Result<EndpointInfo, RuntimeError>;
}
