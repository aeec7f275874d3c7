//! Generation entity model, DTOs, and the `Video` display projection.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::{DbId, Timestamp};

/// A generation row from the `generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    pub project_id: DbId,
    pub user_id: DbId,
    pub prompt: String,
    #[sqlx(try_from = "String")]
    pub status: GenerationStatus,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub model_id: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail_url: Option<String>,
    /// Task id assigned by the video provider once submitted.
    pub provider_job_id: Option<String>,
    pub metadata: serde_json::Value,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new `queued` generation.
#[derive(Debug, Clone)]
pub struct CreateGeneration {
    pub project_id: DbId,
    pub user_id: DbId,
    pub prompt: String,
    pub model_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Fields written alongside a status transition. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct GenerationUpdate {
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<f64>,
    pub provider_job_id: Option<String>,
    /// Merged into the existing `metadata` object.
    pub metadata: Option<serde_json::Value>,
}

/// Display-oriented metadata nested in a [`Video`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub thumbnail_url: Option<String>,
    pub duration: Option<f64>,
    pub error: Option<String>,
}

/// Flattened view of a generation for video lists.
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: DbId,
    pub video_url: Option<String>,
    pub status: GenerationStatus,
    pub prompt: String,
    pub created_at: Timestamp,
    pub metadata: VideoMetadata,
}

impl From<Generation> for Video {
    fn from(g: Generation) -> Self {
        Self {
            id: g.id,
            video_url: g.video_url,
            status: g.status,
            prompt: g.prompt,
            created_at: g.created_at,
            metadata: VideoMetadata {
                thumbnail_url: g.thumbnail_url,
                duration: g.duration,
                error: g.error_message,
            },
        }
    }
}
