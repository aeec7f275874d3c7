//! Repository for the curated `discoveries` feed.

use sqlx::PgPool;
use vidgen_core::types::DbId;

use crate::models::discovery::{AvailableVideo, CreateDiscovery, Discovery, DiscoveryVideo};

const COLUMNS: &str = "id, generation_id, display_order, created_by, created_at, updated_at";

/// Provides CRUD and ordering operations for the discovery feed.
pub struct DiscoveryRepo;

impl DiscoveryRepo {
    /// All featured videos in display order.
    pub async fn list_videos(pool: &PgPool) -> Result<Vec<DiscoveryVideo>, sqlx::Error> {
        sqlx::query_as::<_, DiscoveryVideo>(
            "SELECT d.id, d.generation_id, d.display_order,
                    g.video_url, g.thumbnail_url, g.prompt, g.status, g.duration,
                    d.created_at
             FROM discoveries d
             JOIN generations g ON g.id = d.generation_id
             ORDER BY d.display_order ASC, d.created_at ASC",
        )
        .fetch_all(pool)
        .await
    }

    /// Completed generations with a video that are not featured yet.
    pub async fn list_available(pool: &PgPool) -> Result<Vec<AvailableVideo>, sqlx::Error> {
        sqlx::query_as::<_, AvailableVideo>(
            "SELECT g.id AS generation_id, g.project_id, p.title AS project_title,
                    g.prompt, g.video_url, g.thumbnail_url, g.created_at
             FROM generations g
             JOIN projects p ON p.id = g.project_id
             WHERE g.status = 'completed'
               AND g.video_url IS NOT NULL
               AND NOT EXISTS (SELECT 1 FROM discoveries d WHERE d.generation_id = g.id)
             ORDER BY g.created_at DESC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Discovery>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM discoveries WHERE id = $1");
        sqlx::query_as::<_, Discovery>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Feature a generation. Without an explicit order it goes last.
    ///
    /// Featuring the same generation twice violates `uq_discoveries_generation`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDiscovery,
        created_by: DbId,
    ) -> Result<Discovery, sqlx::Error> {
        let query = format!(
            "INSERT INTO discoveries (generation_id, display_order, created_by)
             VALUES (
                $1,
                COALESCE($2, (SELECT COALESCE(MAX(display_order), 0) + 1 FROM discoveries)),
                $3
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Discovery>(&query)
            .bind(input.generation_id)
            .bind(input.display_order)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn update_order(
        pool: &PgPool,
        id: DbId,
        display_order: i32,
    ) -> Result<Option<Discovery>, sqlx::Error> {
        let query = format!(
            "UPDATE discoveries SET display_order = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Discovery>(&query)
            .bind(id)
            .bind(display_order)
            .fetch_optional(pool)
            .await
    }

    /// Remove a generation from the feed. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM discoveries WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
