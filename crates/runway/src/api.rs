//! REST API client for Runway image-to-video tasks.
//!
//! Wraps task creation (`POST /v1/image_to_video`) and task retrieval
//! (`GET /v1/tasks/{id}`) using [`reqwest`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::{ProviderStatus, VideoProvider};
use crate::status::{extract_output_url, map_task_status};

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.dev.runwayml.com";
/// API version pinned in the `X-Runway-Version` header.
pub const API_VERSION: &str = "2024-11-06";
/// Image-to-video model used for every generation.
pub const DEFAULT_MODEL_ID: &str = "gen3a_turbo";

/// HTTP client for the Runway API.
pub struct RunwayApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model_id: String,
}

/// Body of `POST /v1/image_to_video`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    model: &'a str,
    prompt_image: &'a str,
    prompt_text: &'a str,
}

/// Response of `POST /v1/image_to_video`.
#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: Option<String>,
}

/// Response of `GET /v1/tasks/{id}`.
#[derive(Debug, Deserialize)]
pub struct TaskResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: serde_json::Value,
    pub failure: Option<String>,
}

/// Errors from the Runway REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum RunwayApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Runway returned a non-2xx status code.
    #[error("Runway API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response was missing a required field.
    #[error("Invalid Runway response: {0}")]
    InvalidResponse(String),
}

impl RunwayApi {
    /// Create a client for `api_url` authenticated with `api_key`.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }

    /// Override the model id sent with each task.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Create an image-to-video task. Returns the task id.
    pub async fn create_task(
        &self,
        image_url: &str,
        prompt: &str,
    ) -> Result<String, RunwayApiError> {
        tracing::info!(
            image_url,
            prompt_length = prompt.len(),
            "Starting video generation with Runway",
        );

        let body = CreateTaskRequest {
            model: &self.model_id,
            prompt_image: image_url,
            prompt_text: prompt,
        };

        let response = self
            .client
            .post(format!("{}/v1/image_to_video", self.api_url))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let created: CreateTaskResponse = Self::parse_response(response).await?;
        let task_id = created
            .id
            .ok_or_else(|| RunwayApiError::InvalidResponse("missing task id".into()))?;

        tracing::info!(task_id = %task_id, "Runway generation started");
        Ok(task_id)
    }

    /// Retrieve a task by id.
    pub async fn get_task(&self, task_id: &str) -> Result<TaskResponse, RunwayApiError> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.api_url, task_id))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, returning a
    /// [`RunwayApiError::ApiError`] with the body text otherwise.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RunwayApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RunwayApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RunwayApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

impl From<TaskResponse> for ProviderStatus {
    fn from(task: TaskResponse) -> Self {
        Self {
            status: map_task_status(&task.status),
            output_url: extract_output_url(&task.output),
            raw_status: task.status,
            failure: task.failure,
        }
    }
}

#[async_trait]
impl VideoProvider for RunwayApi {
    async fn submit(&self, image_url: &str, prompt: &str) -> Result<String, RunwayApiError> {
        self.create_task(image_url, prompt).await
    }

    async fn status(&self, task_id: &str) -> Result<ProviderStatus, RunwayApiError> {
        let task = self.get_task(task_id).await?;
        tracing::debug!(
            task_id,
            raw_status = %task.status,
            has_output = !task.output.is_null(),
            "Runway status check",
        );
        Ok(task.into())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vidgen_core::generation::GenerationStatus;

    use super::*;

    #[test]
    fn task_response_converts_to_provider_status() {
        let task: TaskResponse = serde_json::from_value(json!({
            "id": "task-1",
            "status": "SUCCEEDED",
            "output": [{ "url": "https://cdn.example/out.mp4" }]
        }))
        .unwrap();

        let status = ProviderStatus::from(task);
        assert_eq!(status.status, GenerationStatus::Processing);
        assert_eq!(status.raw_status, "SUCCEEDED");
        assert_eq!(status.output_url.as_deref(), Some("https://cdn.example/out.mp4"));
        assert!(status.failure.is_none());
    }

    #[test]
    fn failed_task_keeps_failure_reason() {
        let task: TaskResponse = serde_json::from_value(json!({
            "id": "task-2",
            "status": "FAILED",
            "failure": "content moderation"
        }))
        .unwrap();

        let status = ProviderStatus::from(task);
        assert_eq!(status.status, GenerationStatus::Failed);
        assert_eq!(status.failure.as_deref(), Some("content moderation"));
        assert!(status.output_url.is_none());
    }

    #[test]
    fn create_request_uses_camel_case() {
        let body = CreateTaskRequest {
            model: DEFAULT_MODEL_ID,
            prompt_image: "https://img.example/a.png",
            prompt_text: "waves",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gen3a_turbo");
        assert_eq!(json["promptImage"], "https://img.example/a.png");
        assert_eq!(json["promptText"], "waves");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = RunwayApi::new("https://api.example/".into(), "key".into());
        assert_eq!(api.api_url, "https://api.example");
        assert_eq!(api.model_id(), DEFAULT_MODEL_ID);
    }
}
