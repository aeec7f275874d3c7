//! The server endpoints the client talks to.
//!
//! [`VideoApi`] is the seam the orchestrator and status client depend on;
//! [`HttpVideoApi`] implements it over `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::DbId;

use crate::error::ClientError;
use crate::session::SessionStore;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `GET /api/videos/status/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatusReport {
    pub status: GenerationStatus,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl GenerationStatusReport {
    pub fn new(status: GenerationStatus) -> Self {
        Self {
            status,
            video_url: None,
            progress: None,
            error: None,
            metadata: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub title: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectRef {
    pub id: DbId,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub project_id: DbId,
    pub prompt: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmittedGeneration {
    pub generation_id: String,
    pub status: GenerationStatus,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    code: Option<String>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn check_status(&self, generation_id: &str)
        -> Result<GenerationStatusReport, ClientError>;

    async fn create_project(&self, project: &NewProject) -> Result<ProjectRef, ClientError>;

    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmittedGeneration, ClientError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`VideoApi`] over HTTP, authenticated from a [`SessionStore`].
pub struct HttpVideoApi {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpVideoApi {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Start a request with session headers attached. Idle sessions are
    /// cleared and refused.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        if self.session.is_idle() {
            tracing::info!("Session idle, clearing stored tokens");
            self.session.clear();
            return Err(ClientError::SessionExpired);
        }

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = self.session.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(csrf) = self.session.csrf_token() {
            builder = builder.header("X-CSRF-Token", csrf);
        }
        self.session.touch();
        Ok(builder)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body));
        }
        let envelope: DataEnvelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

/// Classify a non-2xx response.
///
/// 402 or an `INSUFFICIENT_TOKENS` code becomes
/// [`ClientError::InsufficientCredits`]; anything else keeps the server's
/// message, falling back to the raw body or the status reason.
pub fn error_from_response(status: StatusCode, body: &str) -> ClientError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (message, code) = match parsed {
        Some(ErrorBody { error, code }) => (error, code),
        None => (None, None),
    };
    let message = message
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    if status == StatusCode::PAYMENT_REQUIRED || code.as_deref() == Some("INSUFFICIENT_TOKENS") {
        return ClientError::InsufficientCredits(message);
    }
    ClientError::Http {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl VideoApi for HttpVideoApi {
    async fn check_status(
        &self,
        generation_id: &str,
    ) -> Result<GenerationStatusReport, ClientError> {
        let response = self
            .request(Method::GET, &format!("/api/videos/status/{generation_id}"))?
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn create_project(&self, project: &NewProject) -> Result<ProjectRef, ClientError> {
        let response = self
            .request(Method::POST, "/api/projects")?
            .json(project)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmittedGeneration, ClientError> {
        let response = self
            .request(Method::POST, "/api/videos/generate")?
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn payment_required_is_insufficient_credits() {
        let err = error_from_response(
            StatusCode::PAYMENT_REQUIRED,
            r#"{"error":"Insufficient tokens: 0 available, 1 required","code":"INSUFFICIENT_TOKENS"}"#,
        );
        assert_matches!(err, ClientError::InsufficientCredits(msg) if msg.starts_with("Insufficient tokens"));
    }

    #[test]
    fn code_alone_is_enough() {
        let err = error_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"no balance","code":"INSUFFICIENT_TOKENS"}"#,
        );
        assert!(err.is_insufficient_credits());
    }

    #[test]
    fn other_errors_keep_server_message() {
        let err = error_from_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"Generation not found","code":"NOT_FOUND"}"#,
        );
        assert_matches!(err, ClientError::Http { status: 404, message } if message == "Generation not found");
    }

    #[test]
    fn non_json_body_is_used_verbatim() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_matches!(err, ClientError::Http { status: 502, message } if message == "upstream down");
    }

    #[test]
    fn empty_body_falls_back_to_reason() {
        let err = error_from_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_matches!(err, ClientError::Http { message, .. } if message == "Service Unavailable");
    }

    #[test]
    fn status_report_tolerates_missing_fields() {
        let report: GenerationStatusReport =
            serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(report.status, GenerationStatus::Processing);
        assert!(report.video_url.is_none());
        assert!(report.progress.is_none());
    }

    #[test]
    fn idle_session_refuses_requests() {
        let session = Arc::new(SessionStore::new(std::time::Duration::from_secs(60)));
        session.set_tokens("token", None);
        session.touch_at(chrono::Utc::now() - chrono::Duration::minutes(5));
        let api = HttpVideoApi::new("http://localhost:1", Arc::clone(&session));

        assert_matches!(api.request(Method::GET, "/api/health"), Err(ClientError::SessionExpired));
        assert!(session.access_token().is_none());
    }
}
