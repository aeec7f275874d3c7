//! Route definitions for `/discoveries`.

use axum::routing::{delete, get, put};
use axum::Router;

use crate::handlers::discovery;
use crate::state::AppState;

/// Routes mounted at `/discoveries`.
///
/// ```text
/// GET    /               -> list (public)
/// POST   /               -> create (admin)
/// GET    /available      -> list_available (admin)
/// DELETE /{id}           -> delete (admin)
/// PUT    /{id}/order     -> update_order (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(discovery::list).post(discovery::create))
        .route("/available", get(discovery::list_available))
        .route("/{id}", delete(discovery::delete))
        .route("/{id}/order", put(discovery::update_order))
}
