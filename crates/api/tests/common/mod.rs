#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use vidgen_api::auth::jwt::{generate_access_token, JwtConfig};
use vidgen_api::config::ServerConfig;
use vidgen_api::engine::GenerationTracker;
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::payment::PaymentProviderKind;
use vidgen_core::tokens::TokenTransactionType;
use vidgen_core::types::DbId;
use vidgen_db::models::token::TokenCredit;
use vidgen_db::repositories::TokenRepo;
use vidgen_events::EventBus;
use vidgen_payments::MockPaymentProvider;
use vidgen_runway::{ProviderStatus, RunwayApiError, VideoProvider};

pub const TEST_VIDEO_URL: &str = "https://cdn.example.com/out.mp4";

/// Build a test `ServerConfig` with safe defaults and a fast tracker budget.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "integration-test-secret-with-enough-bytes".to_string(),
            access_token_expiry_mins: 15,
        },
        runway_api_url: "http://runway.invalid".to_string(),
        runway_api_key: String::new(),
        payment_provider: PaymentProviderKind::Mock,
        generation_poll_interval: Duration::from_millis(10),
        generation_max_attempts: 5,
    }
}

// ---------------------------------------------------------------------------
// Fake video provider
// ---------------------------------------------------------------------------

/// Provider that replays a scripted list of status reports.
///
/// Once the script runs out it keeps answering with the last report.
pub struct FakeVideoProvider {
    script: Mutex<VecDeque<ProviderStatus>>,
    last: Mutex<Option<ProviderStatus>>,
    reject_submit: bool,
    pub submissions: Mutex<Vec<(String, String)>>,
}

impl FakeVideoProvider {
    pub fn scripted(reports: Vec<ProviderStatus>) -> Self {
        Self {
            script: Mutex::new(reports.into()),
            last: Mutex::new(None),
            reject_submit: false,
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds on the first poll with [`TEST_VIDEO_URL`].
    pub fn succeeding() -> Self {
        Self::scripted(vec![report(GenerationStatus::Processing, "SUCCEEDED", Some(TEST_VIDEO_URL))])
    }

    pub fn rejecting() -> Self {
        Self {
            reject_submit: true,
            ..Self::scripted(Vec::new())
        }
    }
}

pub fn report(status: GenerationStatus, raw: &str, url: Option<&str>) -> ProviderStatus {
    ProviderStatus {
        status,
        raw_status: raw.to_string(),
        output_url: url.map(str::to_owned),
        failure: None,
    }
}

#[async_trait]
impl VideoProvider for FakeVideoProvider {
    async fn submit(&self, image_url: &str, prompt: &str) -> Result<String, RunwayApiError> {
        if self.reject_submit {
            return Err(RunwayApiError::ApiError {
                status: 400,
                body: "rejected".to_string(),
            });
        }
        self.submissions
            .lock()
            .unwrap()
            .push((image_url.to_string(), prompt.to_string()));
        Ok(format!("task-{}", Uuid::new_v4()))
    }

    async fn status(&self, _task_id: &str) -> Result<ProviderStatus, RunwayApiError> {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone().ok_or(RunwayApiError::InvalidResponse(
            "no scripted status".to_string(),
        ))
    }

    fn model_id(&self) -> &str {
        "fake-model"
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Everything a test may need to poke at behind the router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub payments: Arc<MockPaymentProvider>,
    pub video: Arc<FakeVideoProvider>,
}

pub fn build_test_app_with(pool: PgPool, video: FakeVideoProvider) -> TestApp {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let video = Arc::new(video);
    let payments = Arc::new(MockPaymentProvider::new());

    let tracker = Arc::new(GenerationTracker::with_budget(
        pool.clone(),
        video.clone(),
        Arc::clone(&event_bus),
        config.generation_poll_interval,
        config.generation_max_attempts,
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
        payment_provider: payments.clone(),
        tracker,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        payments,
        video,
    }
}

/// Build the full application router with a provider that succeeds at once.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, FakeVideoProvider::succeeding()).router
}

// ---------------------------------------------------------------------------
// Auth + fixtures
// ---------------------------------------------------------------------------

pub fn token_for(user_id: DbId, role: &str) -> String {
    generate_access_token(user_id, role, &test_config().jwt).unwrap()
}

/// A fresh user id and a bearer token for it.
pub fn new_user() -> (DbId, String) {
    let id = Uuid::new_v4();
    (id, token_for(id, "user"))
}

pub fn new_admin() -> (DbId, String) {
    let id = Uuid::new_v4();
    (id, token_for(id, "admin"))
}

pub async fn grant_tokens(pool: &PgPool, user_id: DbId, amount: i64) {
    TokenRepo::add_tokens(
        pool,
        &TokenCredit {
            user_id,
            amount,
            transaction_type: TokenTransactionType::Bonus,
            description: "test grant".to_string(),
            payment_id: None,
            metadata: json!({}),
        },
    )
    .await
    .unwrap();
}

/// Create a project with an image through the API and return its id.
pub async fn create_project(app: &Router, token: &str) -> DbId {
    let response = post_json(
        app.clone(),
        "/api/projects",
        token,
        json!({ "title": "Beach", "image_url": "https://cdn.example.com/beach.png" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().parse().unwrap()
}

/// Wait until a generation reaches a terminal status (or give up after ~3 s).
pub async fn wait_for_terminal(pool: &PgPool, generation_id: DbId) -> GenerationStatus {
    for _ in 0..300 {
        let generation = vidgen_db::repositories::GenerationRepo::find_by_id(pool, generation_id)
            .await
            .unwrap()
            .unwrap();
        if generation.status.is_terminal() {
            return generation.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation {generation_id} never reached a terminal status");
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Send a GET request without authentication.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
