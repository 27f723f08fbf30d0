use super::{types::AuthMethod, types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Window size is not 0
/// - Api-key auth has a key configured
/// - An enabled orchestrator has a runtime to talk to
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.transform.window_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transform.window_secs cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey && config.auth.api_key.is_none() {
        return Err(ConfigError::ValidationError(
            "auth.api_key is required when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.orchestrator.enabled && config.runtime.is_none() {
        return Err(ConfigError::ValidationError(
            "orchestrator.enabled requires a [runtime] section".to_string(),
        ));
    }

    Ok(())
}
