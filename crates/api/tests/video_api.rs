//! Integration tests for `/api/videos`: submission, background tracking,
//! status, and the event stream.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, create_project, get_auth, grant_tokens, new_user, post_json, report,
    wait_for_terminal, FakeVideoProvider, TEST_VIDEO_URL,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::tokens::TokenTransactionType;
use vidgen_core::types::DbId;
use vidgen_db::repositories::{GenerationRepo, TokenRepo};
use vidgen_events::GenerationEventKind;
use vidgen_runway::ProviderStatus;

async fn submit(app: &axum::Router, token: &str, project_id: DbId, prompt: &str) -> axum::response::Response {
    post_json(
        app.clone(),
        "/api/videos/generate",
        token,
        json!({ "project_id": project_id, "prompt": prompt }),
    )
    .await
}

async fn generation_id(response: axum::response::Response) -> DbId {
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "queued");
    json["data"]["generation_id"].as_str().unwrap().parse().unwrap()
}

// ---------------------------------------------------------------------------
// Validation and preconditions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_balance_returns_402(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, token) = new_user();
    let project_id = create_project(&app, &token).await;

    let response = submit(&app, &token, project_id, "a cat surfing").await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INSUFFICIENT_TOKENS");
    assert_eq!(json["error"], "Insufficient tokens: 0 available, 1 required");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blank_prompt_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, token) = new_user();
    let project_id = create_project(&app, &token).await;

    let response = submit(&app, &token, project_id, "   ").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Prompt is required");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overlong_prompt_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, token) = new_user();
    let project_id = create_project(&app, &token).await;

    let response = submit(&app, &token, project_id, &"x".repeat(501)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Prompt must be less than 500 characters");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn project_without_image_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (user_id, token) = new_user();
    grant_tokens(&pool, user_id, 1).await;

    let response = post_json(app.clone(), "/api/projects", &token, json!({ "title": "bare" })).await;
    let project_id: DbId = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let response = submit(&app, &token, project_id, "a cat surfing").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cannot_generate_in_someone_elses_project(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (_, owner) = new_user();
    let (intruder_id, intruder) = new_user();
    grant_tokens(&pool, intruder_id, 5).await;
    let project_id = create_project(&app, &owner).await;

    let response = submit(&app, &intruder, project_id, "a cat surfing").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Background tracking
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn successful_generation_completes_and_charges_one_token(pool: PgPool) {
    let test = common::build_test_app_with(
        pool.clone(),
        FakeVideoProvider::scripted(vec![
            report(GenerationStatus::Queued, "PENDING", None),
            report(GenerationStatus::Generating, "RUNNING", None),
            report(GenerationStatus::Processing, "SUCCEEDED", Some(TEST_VIDEO_URL)),
        ]),
    );
    let mut events = test.state.event_bus.subscribe();
    let (user_id, token) = new_user();
    grant_tokens(&pool, user_id, 3).await;
    let project_id = create_project(&test.router, &token).await;

    let id = generation_id(submit(&test.router, &token, project_id, "a cat surfing").await).await;

    assert_eq!(wait_for_terminal(&pool, id).await, GenerationStatus::Completed);

    let generation = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(generation.video_url.as_deref(), Some(TEST_VIDEO_URL));
    assert_eq!(generation.model_id.as_deref(), Some("fake-model"));
    assert!(generation.provider_job_id.is_some());
    assert!(generation.started_at.is_some());
    assert!(generation.completed_at.is_some());
    assert_eq!(
        generation.metadata["image_url"],
        "https://cdn.example.com/beach.png"
    );

    let submissions = test.video.submissions.lock().unwrap().clone();
    assert_eq!(
        submissions,
        vec![(
            "https://cdn.example.com/beach.png".to_string(),
            "a cat surfing".to_string()
        )]
    );

    // The debit lands right after the completing transition.
    let mut balance = 0;
    for _ in 0..100 {
        balance = TokenRepo::get_balance(&pool, user_id).await.unwrap();
        if balance == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(balance, 2);
    let history = TokenRepo::transaction_history(&pool, user_id, 10, 0).await.unwrap();
    assert_eq!(history[0].transaction_type, TokenTransactionType::Usage);
    assert_eq!(history[0].amount, -1);
    assert_eq!(history[0].description, format!("Video generation: {id}"));

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.generation_id, id);
        kinds.push(event.kind);
    }
    assert_eq!(kinds.first(), Some(&GenerationEventKind::Created));
    assert_eq!(kinds.last(), Some(&GenerationEventKind::Completed));

    let status = body_json(
        get_auth(test.router.clone(), &format!("/api/videos/status/{id}"), &token).await,
    )
    .await;
    assert_eq!(status["data"]["status"], "completed");
    assert_eq!(status["data"]["progress"], 100);
    assert_eq!(status["data"]["video_url"], TEST_VIDEO_URL);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn provider_failure_keeps_its_message_and_charges_nothing(pool: PgPool) {
    let test = common::build_test_app_with(
        pool.clone(),
        FakeVideoProvider::scripted(vec![ProviderStatus {
            failure: Some("Prompt rejected by moderation".to_string()),
            ..report(GenerationStatus::Failed, "FAILED", None)
        }]),
    );
    let (user_id, token) = new_user();
    grant_tokens(&pool, user_id, 1).await;
    let project_id = create_project(&test.router, &token).await;

    let id = generation_id(submit(&test.router, &token, project_id, "something").await).await;

    assert_eq!(wait_for_terminal(&pool, id).await, GenerationStatus::Failed);
    let generation = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(
        generation.error_message.as_deref(),
        Some("Prompt rejected by moderation")
    );
    assert_eq!(TokenRepo::get_balance(&pool, user_id).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn success_without_url_fails(pool: PgPool) {
    let test = common::build_test_app_with(
        pool.clone(),
        FakeVideoProvider::scripted(vec![report(
            GenerationStatus::Processing,
            "SUCCEEDED",
            None,
        )]),
    );
    let (user_id, token) = new_user();
    grant_tokens(&pool, user_id, 1).await;
    let project_id = create_project(&test.router, &token).await;

    let id = generation_id(submit(&test.router, &token, project_id, "something").await).await;

    assert_eq!(wait_for_terminal(&pool, id).await, GenerationStatus::Failed);
    let generation = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(
        generation.error_message.as_deref(),
        Some("No video URL received from provider")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rejected_submission_fails_generation(pool: PgPool) {
    let test = common::build_test_app_with(pool.clone(), FakeVideoProvider::rejecting());
    let (user_id, token) = new_user();
    grant_tokens(&pool, user_id, 1).await;
    let project_id = create_project(&test.router, &token).await;

    let id = generation_id(submit(&test.router, &token, project_id, "something").await).await;

    assert_eq!(wait_for_terminal(&pool, id).await, GenerationStatus::Failed);
    let generation = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(generation.error_message.as_deref(), Some("Video generation failed"));
    assert!(generation.provider_job_id.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn exhausted_polling_times_out(pool: PgPool) {
    let test = common::build_test_app_with(
        pool.clone(),
        FakeVideoProvider::scripted(vec![report(GenerationStatus::Generating, "RUNNING", None)]),
    );
    let (user_id, token) = new_user();
    grant_tokens(&pool, user_id, 1).await;
    let project_id = create_project(&test.router, &token).await;

    let id = generation_id(submit(&test.router, &token, project_id, "something").await).await;

    assert_eq!(wait_for_terminal(&pool, id).await, GenerationStatus::Failed);
    let generation = GenerationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(
        generation.error_message.as_deref(),
        Some("Generation timed out after 5 minutes")
    );
}

// ---------------------------------------------------------------------------
// Status + events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn status_of_unknown_generation_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, token) = new_user();

    let response = get_auth(app, &format!("/api/videos/status/{}", Uuid::new_v4()), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn status_of_other_users_generation_is_forbidden(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (owner_id, owner) = new_user();
    let (_, stranger) = new_user();
    grant_tokens(&pool, owner_id, 1).await;
    let project_id = create_project(&app, &owner).await;
    let id = generation_id(submit(&app, &owner, project_id, "something").await).await;

    let response = get_auth(app.clone(), &format!("/api/videos/status/{id}"), &stranger).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    wait_for_terminal(&pool, id).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn event_stream_is_server_sent_events(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, token) = new_user();

    let response = get_auth(app, "/api/videos/events", &token).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
