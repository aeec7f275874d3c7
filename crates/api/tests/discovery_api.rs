//! Integration tests for `/api/discoveries`.

mod common;

use axum::http::StatusCode;
use common::{body_json, create_project, delete, get, get_auth, new_admin, new_user, post_json, put_json};
use serde_json::json;
use sqlx::PgPool;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::DbId;
use vidgen_db::models::generation::{CreateGeneration, GenerationUpdate};
use vidgen_db::repositories::GenerationRepo;

/// Insert a generation and walk it to `completed` with a video.
async fn completed_generation(pool: &PgPool, project_id: DbId, user_id: DbId) -> DbId {
    let generation = GenerationRepo::create(
        pool,
        &CreateGeneration {
            project_id,
            user_id,
            prompt: "northern lights".to_string(),
            model_id: None,
            metadata: json!({}),
        },
    )
    .await
    .unwrap();

    for status in [
        GenerationStatus::Preparing,
        GenerationStatus::Generating,
        GenerationStatus::Processing,
    ] {
        GenerationRepo::transition(pool, generation.id, status, &GenerationUpdate::default())
            .await
            .unwrap()
            .unwrap();
    }
    GenerationRepo::transition(
        pool,
        generation.id,
        GenerationStatus::Completed,
        &GenerationUpdate {
            video_url: Some("https://cdn.example.com/aurora.mp4".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    generation.id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn feed_is_public_and_starts_empty(pool: PgPool) {
    let app = common::build_test_app(pool);
    let json = body_json(get(app, "/api/discoveries").await).await;
    assert_eq!(json["data"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn curation_requires_admin(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (_, token) = new_user();

    let response = get_auth(app.clone(), "/api/discoveries/available", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(
        app,
        "/api/discoveries",
        &token,
        json!({ "generation_id": uuid::Uuid::new_v4() }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_features_reorders_and_removes(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (user_id, user) = new_user();
    let (_, admin) = new_admin();
    let project_id = create_project(&app, &user).await;
    let first = completed_generation(&pool, project_id, user_id).await;
    let second = completed_generation(&pool, project_id, user_id).await;

    let available = body_json(get_auth(app.clone(), "/api/discoveries/available", &admin).await).await;
    assert_eq!(available["data"].as_array().unwrap().len(), 2);
    assert_eq!(available["data"][0]["project_title"], "Beach");

    let mut ids = Vec::new();
    for generation_id in [first, second] {
        let response = post_json(
            app.clone(),
            "/api/discoveries",
            &admin,
            json!({ "generation_id": generation_id }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(body_json(response).await["data"]["id"].as_str().unwrap().to_string());
    }

    let feed = body_json(get(app.clone(), "/api/discoveries").await).await;
    assert_eq!(feed["data"][0]["generation_id"], first.to_string());
    assert_eq!(feed["data"][1]["generation_id"], second.to_string());

    let response = put_json(
        app.clone(),
        &format!("/api/discoveries/{}/order", ids[1]),
        &admin,
        json!({ "display_order": -1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let feed = body_json(get(app.clone(), "/api/discoveries").await).await;
    assert_eq!(feed["data"][0]["generation_id"], second.to_string());

    let response = delete(app.clone(), &format!("/api/discoveries/{}", ids[0]), &admin).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let feed = body_json(get(app.clone(), "/api/discoveries").await).await;
    assert_eq!(feed["data"].as_array().unwrap().len(), 1);

    let available = body_json(get_auth(app, "/api/discoveries/available", &admin).await).await;
    assert_eq!(available["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn featuring_twice_conflicts(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (user_id, user) = new_user();
    let (_, admin) = new_admin();
    let project_id = create_project(&app, &user).await;
    let generation_id = completed_generation(&pool, project_id, user_id).await;
    let body = json!({ "generation_id": generation_id });

    let response = post_json(app.clone(), "/api/discoveries", &admin, body.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(app, "/api/discoveries", &admin, body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unfinished_generation_cannot_be_featured(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (user_id, user) = new_user();
    let (_, admin) = new_admin();
    let project_id = create_project(&app, &user).await;
    let generation = GenerationRepo::create(
        &pool,
        &CreateGeneration {
            project_id,
            user_id,
            prompt: "unfinished".to_string(),
            model_id: None,
            metadata: json!({}),
        },
    )
    .await
    .unwrap();

    let response = post_json(
        app,
        "/api/discoveries",
        &admin,
        json!({ "generation_id": generation.id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
