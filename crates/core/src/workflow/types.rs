//! Workflow execution data types and the transition function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during workflow orchestration.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Execution not found.
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    /// A step outcome does not apply to the current state.
    #[error("invalid transition: {state} cannot accept {outcome}")]
    InvalidTransition { state: String, outcome: String },

    /// Execution store error.
    #[error("execution store error: {0}")]
    Store(#[from] super::store::ExecutionError),

    /// Training/hosting runtime error.
    #[error("runtime error: {0}")]
    Runtime(#[from] crate::runtime::RuntimeError),
}

/// A start signal for the orchestrator. Deliberately carries no payload
/// beyond its arrival time: the execution re-reads the current aggregated
/// dataset itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSignal {
    pub received_at: DateTime<Utc>,
}

impl StartSignal {
    pub fn now() -> Self {
        Self {
            received_at: Utc::now(),
        }
    }
}

/// Where an execution reads its dataset and writes its artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetLocation {
    /// Store root as the runtime addresses it.
    pub store_root: String,
}

impl DatasetLocation {
    pub fn new(store_root: impl Into<String>) -> Self {
        Self {
            store_root: store_root.into(),
        }
    }

    /// Location of the aggregated dataset.
    pub fn aggregated(&self) -> String {
        format!("{}/{}", self.store_root.trim_end_matches('/'), crate::store::AGGREGATED_PREFIX)
    }

    /// Artifact output location for one execution.
    pub fn artifacts(&self, execution_id: &str) -> String {
        format!(
            "{}/{}{}/",
            self.store_root.trim_end_matches('/'),
            crate::store::MODEL_ARTIFACTS_PREFIX,
            execution_id
        )
    }
}

/// Current state of a workflow execution.
///
/// State machine flow:
/// ```text
/// Train -> RegisterModel -> ConfigureHosting -> DeployEndpoint -> Succeeded
///
/// Any non-terminal state can transition to Failed. Terminal states are
/// Succeeded and Failed; there is no retry within an execution.
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionState {
    /// Training job submitted (or about to be); waiting for a terminal
    /// training status.
    Train {
        started_at: DateTime<Utc>,
        /// Runtime job id, once the submission went through.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        training_job_id: Option<String>,
    },

    /// Training produced an artifact; registering it as a named model.
    RegisterModel { artifact_location: String },

    /// Model registered; creating the hosting configuration.
    ConfigureHosting {
        artifact_location: String,
        model_id: String,
    },

    /// Hosting configured; deploying the fixed-name endpoint.
    DeployEndpoint {
        artifact_location: String,
        model_id: String,
        config_id: String,
    },

    /// All four steps completed.
    Succeeded {
        artifact_location: String,
        model_id: String,
        config_id: String,
        endpoint_name: String,
        finished_at: DateTime<Utc>,
    },

    /// A step failed; prior steps' artifacts stay in place.
    Failed {
        at_step: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

/// Outcome of running one step, fed to [`ExecutionState::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    TrainSucceeded { artifact_location: String },
    ModelRegistered { model_id: String },
    HostingConfigured { config_id: String },
    EndpointDeployed { endpoint_name: String },
    StepFailed { error: String },
}

impl StepOutcome {
    fn describe(&self) -> &'static str {
        match self {
            StepOutcome::TrainSucceeded { .. } => "train_succeeded",
            StepOutcome::ModelRegistered { .. } => "model_registered",
            StepOutcome::HostingConfigured { .. } => "hosting_configured",
            StepOutcome::EndpointDeployed { .. } => "endpoint_deployed",
            StepOutcome::StepFailed { .. } => "step_failed",
        }
    }
}

impl ExecutionState {
    /// Initial state of a fresh execution.
    pub fn initial() -> Self {
        ExecutionState::Train {
            started_at: Utc::now(),
            training_job_id: None,
        }
    }

    /// Stable string tag for storage, filtering and display.
    pub fn state_type(&self) -> &'static str {
        match self {
            ExecutionState::Train { .. } => "train",
            ExecutionState::RegisterModel { .. } => "register_model",
            ExecutionState::ConfigureHosting { .. } => "configure_hosting",
            ExecutionState::DeployEndpoint { .. } => "deploy_endpoint",
            ExecutionState::Succeeded { .. } => "succeeded",
            ExecutionState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded { .. } | ExecutionState::Failed { .. }
        )
    }

    /// The next state given the current step's outcome.
    ///
    /// Pure: no clocks besides timestamping terminal states, no I/O. Steps
    /// are strictly ordered; an outcome that does not belong to the current
    /// step is an invalid transition, and terminal states accept nothing.
    pub fn advance(&self, outcome: StepOutcome) -> Result<ExecutionState, WorkflowError> {
        if self.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                state: self.state_type().to_string(),
                outcome: outcome.describe().to_string(),
            });
        }

        match (self, outcome) {
            (state, StepOutcome::StepFailed { error }) => Ok(ExecutionState::Failed {
                at_step: state.state_type().to_string(),
                error,
                failed_at: Utc::now(),
            }),

            (
                ExecutionState::Train { .. },
                StepOutcome::TrainSucceeded { artifact_location },
            ) => Ok(ExecutionState::RegisterModel { artifact_location }),

            (
                ExecutionState::RegisterModel { artifact_location },
                StepOutcome::ModelRegistered { model_id },
            ) => Ok(ExecutionState::ConfigureHosting {
                artifact_location: artifact_location.clone(),
                model_id,
            }),

            (
                ExecutionState::ConfigureHosting {
                    artifact_location,
                    model_id,
                },
                StepOutcome::HostingConfigured { config_id },
            ) => Ok(ExecutionState::DeployEndpoint {
                artifact_location: artifact_location.clone(),
                model_id: model_id.clone(),
                config_id,
            }),

            (
                ExecutionState::DeployEndpoint {
                    artifact_location,
                    model_id,
                    config_id,
                },
                StepOutcome::EndpointDeployed { endpoint_name },
            ) => Ok(ExecutionState::Succeeded {
                artifact_location: artifact_location.clone(),
                model_id: model_id.clone(),
                config_id: config_id.clone(),
                endpoint_name,
                finished_at: Utc::now(),
            }),

            (_, outcome) => Err(WorkflowError::InvalidTransition {
                state: self.state_type().to_string(),
                outcome: outcome.describe().to_string(),
            }),
        }
    }
}

/// One run of the four-step pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub state: ExecutionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> ExecutionState {
        ExecutionState::initial()
    }

    #[test]
    fn test_success_path_walks_all_four_steps_in_order() {
        let state = train();
        let state = state
            .advance(StepOutcome::TrainSucceeded {
                artifact_location: "model-artifacts/exec-1/".to_string(),
            })
            .unwrap();
        assert_eq!(state.state_type(), "register_model");

        let state = state
            .advance(StepOutcome::ModelRegistered {
                model_id: "model-1".to_string(),
            })
            .unwrap();
        assert_eq!(state.state_type(), "configure_hosting");

        let state = state
            .advance(StepOutcome::HostingConfigured {
                config_id: "cfg-1".to_string(),
            })
            .unwrap();
        assert_eq!(state.state_type(), "deploy_endpoint");

        let state = state
            .advance(StepOutcome::EndpointDeployed {
                endpoint_name: "aqueduct-latest".to_string(),
            })
            .unwrap();

        // Every step's output is threaded through to the terminal state.
        match state {
            ExecutionState::Succeeded {
                artifact_location,
                model_id,
                config_id,
                endpoint_name,
                ..
            } => {
                assert_eq!(artifact_location, "model-artifacts/exec-1/");
                assert_eq!(model_id, "model-1");
                assert_eq!(config_id, "cfg-1");
                assert_eq!(endpoint_name, "aqueduct-latest");
            }
            other => panic!("Expected Succeeded, got {other:?}"),
        }
    }

    #[test]
    fn test_steps_cannot_be_skipped_or_reordered() {
        // Deploy outcome against the initial state is rejected.
        let result = train().advance(StepOutcome::EndpointDeployed {
            endpoint_name: "aqueduct-latest".to_string(),
        });
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition { .. })
        ));

        // Register outcome against configure_hosting is rejected.
        let state = ExecutionState::ConfigureHosting {
            artifact_location: "a".to_string(),
            model_id: "m".to_string(),
        };
        let result = state.advance(StepOutcome::ModelRegistered {
            model_id: "m2".to_string(),
        });
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_any_step_can_fail() {
        for state in [
            train(),
            ExecutionState::RegisterModel {
                artifact_location: "a".to_string(),
            },
            ExecutionState::ConfigureHosting {
                artifact_location: "a".to_string(),
                model_id: "m".to_string(),
            },
            ExecutionState::DeployEndpoint {
                artifact_location: "a".to_string(),
                model_id: "m".to_string(),
                config_id: "c".to_string(),
            },
        ] {
            let step = state.state_type().to_string();
            let failed = state
                .advance(StepOutcome::StepFailed {
                    error: "boom".to_string(),
                })
                .unwrap();
            match failed {
                ExecutionState::Failed { at_step, error, .. } => {
                    assert_eq!(at_step, step);
                    assert_eq!(error, "boom");
                }
                other => panic!("Expected Failed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let succeeded = ExecutionState::Succeeded {
            artifact_location: "a".to_string(),
            model_id: "m".to_string(),
            config_id: "c".to_string(),
            endpoint_name: "e".to_string(),
            finished_at: Utc::now(),
        };
        assert!(succeeded
            .advance(StepOutcome::StepFailed {
                error: "late".to_string()
            })
            .is_err());

        let failed = ExecutionState::Failed {
            at_step: "train".to_string(),
            error: "boom".to_string(),
            failed_at: Utc::now(),
        };
        assert!(failed
            .advance(StepOutcome::TrainSucceeded {
                artifact_location: "a".to_string()
            })
            .is_err());
    }

    #[test]
    fn test_state_serialization_roundtrip() {
        let state = ExecutionState::DeployEndpoint {
            artifact_location: "model-artifacts/exec-1/".to_string(),
            model_id: "model-1".to_string(),
            config_id: "cfg-1".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"type\":\"deploy_endpoint\""));

        let parsed: ExecutionState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_dataset_location() {
        let dataset = DatasetLocation::new("/data/aqueduct/");
        assert_eq!(dataset.aggregated(), "/data/aqueduct/aggregated/");
        assert_eq!(
            dataset.artifacts("exec-1"),
            "/data/aqueduct/model-artifacts/exec-1/"
        );
    }
}
