//! Discovery feed models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::{DbId, Timestamp};

/// A row from the `discoveries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Discovery {
    pub id: DbId,
    pub generation_id: DbId,
    pub display_order: i32,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A discovery entry joined with its generation's video fields.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiscoveryVideo {
    pub id: DbId,
    pub generation_id: DbId,
    pub display_order: i32,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub prompt: String,
    #[sqlx(try_from = "String")]
    pub status: GenerationStatus,
    pub duration: Option<f64>,
    pub created_at: Timestamp,
}

/// A completed generation not yet featured, with its project title.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AvailableVideo {
    pub generation_id: DbId,
    pub project_id: DbId,
    pub project_title: Option<String>,
    pub prompt: String,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for featuring a generation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDiscovery {
    pub generation_id: DbId,
    /// Defaults to one past the current maximum.
    pub display_order: Option<i32>,
}

/// DTO for `PUT /discoveries/{id}/order`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDisplayOrder {
    pub display_order: i32,
}
