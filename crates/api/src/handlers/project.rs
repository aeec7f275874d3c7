//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;
use vidgen_core::error::CoreError;
use vidgen_core::project_state::ProjectState;
use vidgen_core::types::DbId;
use vidgen_db::models::generation::Video;
use vidgen_db::models::project::{CreateProject, Project, ProjectWithGenerations, UpdateProject};
use vidgen_db::repositories::{GenerationRepo, ProjectRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a project and check the caller owns it (or is an admin).
pub(crate) async fn find_and_authorize(
    pool: &sqlx::PgPool,
    project_id: DbId,
    auth: &AuthUser,
) -> AppResult<Project> {
    let project = ProjectRepo::find_by_id(pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }))?;

    if !auth.can_access(project.user_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot access another user's project".into(),
        )));
    }

    Ok(project)
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/projects
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let projects = ProjectRepo::list_by_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// POST /api/projects
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    input.validate()?;

    let project = ProjectRepo::create(
        &state.pool,
        auth.user_id,
        &CreateProject {
            title: input.title,
            image_url: input.image_url,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, user_id = %auth.user_id, "Project created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/projects/{id}
///
/// Returns the project with its generations, newest first.
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProjectWithGenerations>>> {
    let project = find_and_authorize(&state.pool, id, &auth).await?;
    let generations = GenerationRepo::list_by_project(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: ProjectWithGenerations {
            project,
            generations,
        },
    }))
}

/// PUT /api/projects/{id}
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateProjectRequest>,
) -> AppResult<Json<DataResponse<Project>>> {
    input.validate()?;
    find_and_authorize(&state.pool, id, &auth).await?;

    let project = ProjectRepo::update(
        &state.pool,
        id,
        &UpdateProject {
            title: input.title,
            image_url: input.image_url,
        },
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Project",
        id,
    }))?;
    Ok(Json(DataResponse { data: project }))
}

/// DELETE /api/projects/{id}
///
/// Soft delete. Generations stay in place.
pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    find_and_authorize(&state.pool, id, &auth).await?;

    if ProjectRepo::soft_delete(&state.pool, id).await? {
        tracing::info!(project_id = %id, user_id = %auth.user_id, "Project deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// GET /api/projects/{id}/state
pub async fn get_state(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProjectState>>> {
    let project = find_and_authorize(&state.pool, id, &auth).await?;
    let generations = GenerationRepo::list_by_project(&state.pool, id).await?;

    let last_modified = generations
        .iter()
        .map(|g| g.updated_at)
        .chain(std::iter::once(project.updated_at))
        .max()
        .unwrap_or(project.updated_at);
    let statuses: Vec<_> = generations.iter().map(|g| g.status).collect();

    Ok(Json(DataResponse {
        data: ProjectState::from_statuses(&statuses, last_modified),
    }))
}

/// GET /api/projects/{id}/videos
pub async fn list_videos(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Video>>>> {
    find_and_authorize(&state.pool, id, &auth).await?;
    let videos = GenerationRepo::list_by_project(&state.pool, id)
        .await?
        .into_iter()
        .map(Video::from)
        .collect();
    Ok(Json(DataResponse { data: videos }))
}
