//! Handlers for the public discovery feed and its admin curation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use vidgen_core::error::CoreError;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::DbId;
use vidgen_db::models::discovery::{
    AvailableVideo, CreateDiscovery, Discovery, DiscoveryVideo, UpdateDisplayOrder,
};
use vidgen_db::repositories::{DiscoveryRepo, GenerationRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/discoveries
///
/// Public. Featured videos in display order.
pub async fn list(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<DiscoveryVideo>>>> {
    let videos = DiscoveryRepo::list_videos(&state.pool).await?;
    Ok(Json(DataResponse { data: videos }))
}

/// GET /api/discoveries/available
pub async fn list_available(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<AvailableVideo>>>> {
    let videos = DiscoveryRepo::list_available(&state.pool).await?;
    Ok(Json(DataResponse { data: videos }))
}

/// POST /api/discoveries
///
/// Features a completed generation. Featuring the same generation twice is
/// rejected by `uq_discoveries_generation` (409).
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateDiscovery>,
) -> AppResult<(StatusCode, Json<DataResponse<Discovery>>)> {
    let generation = GenerationRepo::find_by_id(&state.pool, input.generation_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id: input.generation_id,
        }))?;

    if generation.status != GenerationStatus::Completed {
        return Err(AppError::Core(CoreError::Validation(
            "Only completed videos can be featured".into(),
        )));
    }

    let discovery = DiscoveryRepo::create(&state.pool, &input, admin.user_id).await?;
    tracing::info!(
        discovery_id = %discovery.id,
        generation_id = %discovery.generation_id,
        display_order = discovery.display_order,
        "Video featured",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: discovery })))
}

/// DELETE /api/discoveries/{id}
pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if DiscoveryRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Discovery",
            id,
        }))
    }
}

/// PUT /api/discoveries/{id}/order
pub async fn update_order(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateDisplayOrder>,
) -> AppResult<Json<DataResponse<Discovery>>> {
    let discovery = DiscoveryRepo::update_order(&state.pool, id, input.display_order)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Discovery",
            id,
        }))?;
    Ok(Json(DataResponse { data: discovery }))
}
