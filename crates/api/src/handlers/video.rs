//! Handlers for the `/videos` resource: submission, status, and the live
//! event stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use vidgen_core::error::CoreError;
use vidgen_core::generation::{validate_prompt, GenerationStatus};
use vidgen_core::tokens::VIDEO_GENERATION_TOKEN_COST;
use vidgen_core::types::DbId;
use vidgen_db::models::generation::CreateGeneration;
use vidgen_db::repositories::{GenerationRepo, TokenRepo};
use vidgen_events::{GenerationEvent, GenerationEventKind};

use crate::error::{AppError, AppResult};
use crate::handlers::project::find_and_authorize;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    pub project_id: DbId,
    pub prompt: String,
    /// Extra generation metadata. `image_url` here is used when the project
    /// has none of its own.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct GenerateVideoResponse {
    pub generation_id: DbId,
    pub status: GenerationStatus,
}

/// Body of `GET /videos/status/{id}`.
#[derive(Debug, Serialize)]
pub struct GenerationStatusResponse {
    pub status: GenerationStatus,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub progress: u8,
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// POST /api/videos/generate
///
/// Checks the prompt, the caller's balance and the project, records a
/// `queued` generation, and hands it to the background tracker. The token
/// is charged only once the video is ready.
pub async fn generate(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<GenerateVideoRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerateVideoResponse>>)> {
    validate_prompt(&input.prompt)?;

    let balance = TokenRepo::get_balance(&state.pool, auth.user_id).await?;
    if balance < VIDEO_GENERATION_TOKEN_COST {
        return Err(AppError::Core(CoreError::InsufficientTokens {
            available: balance,
            required: VIDEO_GENERATION_TOKEN_COST,
        }));
    }

    let project = find_and_authorize(&state.pool, input.project_id, &auth).await?;

    let mut metadata = match input.metadata {
        Some(serde_json::Value::Object(map)) => map,
        Some(serde_json::Value::Null) | None => serde_json::Map::new(),
        Some(_) => {
            return Err(AppError::BadRequest("metadata must be a JSON object".into()));
        }
    };
    let image_url = project
        .image_url
        .clone()
        .or_else(|| {
            metadata
                .get("image_url")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Project has no image to animate".into()))?;
    metadata.insert("image_url".into(), json!(image_url));

    let generation = GenerationRepo::create(
        &state.pool,
        &CreateGeneration {
            project_id: project.id,
            user_id: auth.user_id,
            prompt: input.prompt.trim().to_string(),
            model_id: Some(state.tracker.model_id()),
            metadata: serde_json::Value::Object(metadata),
        },
    )
    .await?;

    tracing::info!(
        generation_id = %generation.id,
        project_id = %project.id,
        user_id = %auth.user_id,
        "Generation queued",
    );

    state.event_bus.publish(GenerationEvent::new(
        GenerationEventKind::Created,
        generation.id,
        generation.project_id,
        generation.user_id,
        generation.status,
    ));

    let response = GenerateVideoResponse {
        generation_id: generation.id,
        status: generation.status,
    };
    state.tracker.track(generation);

    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/videos/status/{id}
pub async fn get_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<GenerationStatusResponse>>> {
    let generation = GenerationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id,
        }))?;

    if !auth.can_access(generation.user_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another user's generation".into(),
        )));
    }

    Ok(Json(DataResponse {
        data: GenerationStatusResponse {
            status: generation.status,
            progress: generation.status.progress_percent(),
            video_url: generation.video_url,
            error: generation.error_message,
            metadata: generation.metadata,
        },
    }))
}

// ---------------------------------------------------------------------------
// Live events
// ---------------------------------------------------------------------------

/// GET /api/videos/events
///
/// Server-sent events for the caller's own generations. Events missed by a
/// lagging subscriber are skipped.
pub async fn events(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = auth.user_id;
    let stream = BroadcastStream::new(state.event_bus.subscribe()).filter_map(move |received| {
        let event = received.ok()?;
        if event.user_id != user_id {
            return None;
        }
        Event::default()
            .event(sse_event_name(event.kind))
            .json_data(&event)
            .ok()
            .map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_event_name(kind: GenerationEventKind) -> &'static str {
    match kind {
        GenerationEventKind::Created => "generation.created",
        GenerationEventKind::StatusChanged => "generation.status_changed",
        GenerationEventKind::Completed => "generation.completed",
        GenerationEventKind::Failed => "generation.failed",
    }
}
