//! Route definitions for the `/videos` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::video;
use crate::state::AppState;

/// Routes mounted at `/videos`.
///
/// ```text
/// POST   /generate       -> generate
/// GET    /status/{id}    -> get_status
/// GET    /events         -> events (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(video::generate))
        .route("/status/{id}", get(video::get_status))
        .route("/events", get(video::events))
}
