//! Repository for the `generations` table.
//!
//! Status writes go through [`GenerationRepo::transition`], which only
//! touches rows whose current status admits the requested move. A terminal
//! status therefore never regresses, even if the provider reports late or
//! out-of-order updates.

use sqlx::PgPool;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::DbId;

use crate::models::generation::{CreateGeneration, Generation, GenerationUpdate};

const COLUMNS: &str = "id, project_id, user_id, prompt, status, video_url, error_message, \
    model_id, duration, thumbnail_url, provider_job_id, metadata, started_at, completed_at, \
    created_at, updated_at";

/// Provides lifecycle operations for generations.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new generation in `queued` status.
    pub async fn create(pool: &PgPool, input: &CreateGeneration) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations (project_id, user_id, prompt, model_id, metadata)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(input.project_id)
            .bind(input.user_id)
            .bind(&input.prompt)
            .bind(&input.model_id)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All generations of a project, newest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Non-terminal generations already submitted to the provider.
    ///
    /// Used on startup to resume tracking after a restart.
    pub async fn list_in_flight(pool: &PgPool) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations
             WHERE status NOT IN ('completed', 'failed') AND provider_job_id IS NOT NULL
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Generation>(&query).fetch_all(pool).await
    }

    /// Move a generation to `to`, writing the non-`None` fields of `update`.
    ///
    /// Returns `None` when the generation does not exist or its current
    /// status does not allow the move (including any move out of a terminal
    /// status). `started_at` is stamped on entering `preparing`;
    /// `completed_at` on entering a terminal status.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        to: GenerationStatus,
        update: &GenerationUpdate,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let allowed_from: Vec<String> = to
            .predecessors()
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let query = format!(
            "UPDATE generations SET
                status = $2,
                video_url = COALESCE($3, video_url),
                error_message = COALESCE($4, error_message),
                thumbnail_url = COALESCE($5, thumbnail_url),
                duration = COALESCE($6, duration),
                provider_job_id = COALESCE($7, provider_job_id),
                metadata = metadata || COALESCE($8, '{{}}'::jsonb),
                started_at = CASE WHEN $2 = 'preparing' THEN COALESCE(started_at, NOW())
                                  ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW()
                                    ELSE completed_at END
             WHERE id = $1 AND status = ANY($9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .bind(to.as_str())
            .bind(&update.video_url)
            .bind(&update.error_message)
            .bind(&update.thumbnail_url)
            .bind(update.duration)
            .bind(&update.provider_job_id)
            .bind(&update.metadata)
            .bind(&allowed_from)
            .fetch_optional(pool)
            .await
    }

    /// Mark a generation failed from whatever non-terminal status it is in.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_message: &str,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let update = GenerationUpdate {
            error_message: Some(error_message.to_string()),
            ..Default::default()
        };
        Self::transition(pool, id, GenerationStatus::Failed, &update).await
    }
}
