//! Project entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vidgen_core::types::{DbId, Timestamp};

use crate::models::generation::Generation;

/// A project row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub user_id: DbId,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A project together with its generations, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithGenerations {
    #[serde(flatten)]
    pub project: Project,
    pub generations: Vec<Generation>,
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: Option<String>,
    pub image_url: Option<String>,
}

/// DTO for updating an existing project. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub image_url: Option<String>,
}
