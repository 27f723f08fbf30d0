//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the orchestrator.
    /// When disabled, executions can still be started manually via API.
    #[serde(default)]
    pub enabled: bool,

    /// How often to poll a running training job (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Hard bound on a training job's runtime (seconds). Past it the job is
    /// force-stopped and the execution fails.
    #[serde(default = "default_max_training_runtime")]
    pub max_training_runtime_secs: u64,

    /// Training image reference, externally supplied.
    #[serde(default = "default_training_image")]
    pub training_image: String,

    /// Instance type for the single training instance.
    #[serde(default = "default_instance_type")]
    pub training_instance_type: String,

    /// Instance type for the single hosting instance. Defaults to the
    /// smallest supported size.
    #[serde(default = "default_instance_type")]
    pub hosting_instance_type: String,

    /// Name of the live endpoint. Fixed: every execution deploys to this
    /// name, so the latest model wins.
    #[serde(default = "default_endpoint_name")]
    pub endpoint_name: String,
}

fn default_poll_interval() -> u64 {
    2000 // 2 seconds
}

fn default_max_training_runtime() -> u64 {
    600 // 10 minutes
}

fn default_training_image() -> String {
    "aqueduct/xgboost:latest".to_string()
}

fn default_instance_type() -> String {
    "small-1x".to_string()
}

fn default_endpoint_name() -> String {
    "aqueduct-latest".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: default_poll_interval(),
            max_training_runtime_secs: default_max_training_runtime(),
            training_image: default_training_image(),
            training_instance_type: default_instance_type(),
            hosting_instance_type: default_instance_type(),
            endpoint_name: default_endpoint_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.max_training_runtime_secs, 600);
        assert_eq!(config.endpoint_name, "aqueduct-latest");
        assert_eq!(config.training_instance_type, "small-1x");
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            enabled = true
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_training_runtime_secs, 600);
        assert_eq!(config.training_image, "aqueduct/xgboost:latest");
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            enabled = true
            poll_interval_ms = 500
            max_training_runtime_secs = 120
            training_image = "registry.local/trainers/xgboost:1.7"
            training_instance_type = "gpu-1x"
            hosting_instance_type = "medium-2x"
            endpoint_name = "readings-model"
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_training_runtime_secs, 120);
        assert_eq!(config.training_image, "registry.local/trainers/xgboost:1.7");
        assert_eq!(config.hosting_instance_type, "medium-2x");
        assert_eq!(config.endpoint_name, "readings-model");
    }
}
