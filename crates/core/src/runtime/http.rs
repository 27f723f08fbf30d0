//! REST client for a self-hosted training/hosting service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::RuntimeConfig;

use super::types::{
    EndpointConfigSpec, EndpointInfo, EndpointSpec, ModelSpec, RuntimeError, TrainingJobSpec,
    TrainingJobStatus, TrainingRuntime,
};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    model_id: String,
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    config_id: String,
}

/// HTTP backend for the `TrainingRuntime` trait.
pub struct HttpTrainingRuntime {
    client: Client,
    config: RuntimeConfig,
}

impl HttpTrainingRuntime {
    /// Create a new client with the given configuration.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| RuntimeError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RuntimeError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                RuntimeError::Timeout
            } else if e.is_connect() {
                RuntimeError::ConnectionFailed(e.to_string())
            } else {
                RuntimeError::Internal(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            Err(RuntimeError::NotFound(message))
        } else {
            Err(RuntimeError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, RuntimeError> {
        response
            .json::<T>()
            .await
            .map_err(|e| RuntimeError::Internal(format!("Invalid response body: {e}")))
    }
}

#[async_trait]
impl TrainingRuntime for HttpTrainingRuntime {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit_training_job(&self, spec: TrainingJobSpec) -> Result<String, RuntimeError> {
        debug!(image = %spec.image, input = %spec.input_location, "Submitting training job");
        let request = self.client.post(self.url("training-jobs")).json(&spec);
        let response = self.send(request).await?;
        let parsed: SubmitResponse = Self::parse(response).await?;
        Ok(parsed.job_id)
    }

    async fn describe_training_job(
        &self,
        job_id: &str,
    ) -> Result<TrainingJobStatus, RuntimeError> {
        let request = self
            .client
            .get(self.url(&format!("training-jobs/{job_id}")));
        let response = self.send(request).await?;
        Self::parse(response).await
    }

    async fn stop_training_job(&self, job_id: &str) -> Result<(), RuntimeError> {
        let request = self
            .client
            .post(self.url(&format!("training-jobs/{job_id}/stop")));
        self.send(request).await?;
        Ok(())
    }

    async fn create_model(&self, spec: ModelSpec) -> Result<String, RuntimeError> {
        debug!(name = %spec.name, artifact = %spec.artifact_location, "Registering model");
        let request = self.client.post(self.url("models")).json(&spec);
        let response = self.send(request).await?;
        let parsed: ModelResponse = Self::parse(response).await?;
        Ok(parsed.model_id)
    }

    async fn create_endpoint_config(
        &self,
        spec: EndpointConfigSpec,
    ) -> Result<String, RuntimeError> {
        let request = self.client.post(self.url("endpoint-configs")).json(&spec);
        let response = self.send(request).await?;
        let parsed: ConfigResponse = Self::parse(response).await?;
        Ok(parsed.config_id)
    }

    async fn deploy_endpoint(&self, spec: EndpointSpec) -> Result<EndpointInfo, RuntimeError> {
        debug!(endpoint = %spec.name, config = %spec.config_id, "Deploying endpoint");
        let request = self
            .client
            .put(self.url(&format!("endpoints/{}", spec.name)))
            .json(&spec);
        let response = self.send(request).await?;
        Self::parse(response).await
    }

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointInfo, RuntimeError> {
        let request = self.client.get(self.url(&format!("endpoints/{name}")));
        let response = self.send(request).await?;
        Self::parse(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> RuntimeConfig {
        RuntimeConfig {
            url: url.to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_url_building() {
        let runtime = HttpTrainingRuntime::new(config("http://localhost:9400")).unwrap();
        assert_eq!(
            runtime.url("training-jobs"),
            "http://localhost:9400/v1/training-jobs"
        );

        // Trailing slash is tolerated.
        let runtime = HttpTrainingRuntime::new(config("http://localhost:9400/")).unwrap();
        assert_eq!(
            runtime.url("endpoints/aqueduct-latest"),
            "http://localhost:9400/v1/endpoints/aqueduct-latest"
        );
    }

    #[test]
    fn test_backend_name() {
        let runtime = HttpTrainingRuntime::new(config("http://localhost:9400")).unwrap();
        assert_eq!(runtime.name(), "http");
    }

    #[tokio::test]
    async fn test_connection_error_maps_to_connection_failed() {
        // Port 1 is never listening.
        let runtime = HttpTrainingRuntime::new(config("http://127.0.0.1:1")).unwrap();
        let result = runtime.describe_training_job("job-1").await;
        assert!(matches!(
            result,
            Err(RuntimeError::ConnectionFailed(_)) | Err(RuntimeError::Internal(_))
        ));
    }
}
