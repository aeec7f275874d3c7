pub mod discovery;
pub mod health;
pub mod payment;
pub mod project;
pub mod video;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /health                              service + database health (public)
///
/// /projects                            list, create
/// /projects/{id}                       get, update, delete
/// /projects/{id}/state                 aggregated generation status
/// /projects/{id}/videos                video projections, newest first
///
/// /videos/generate                     submit a generation (POST)
/// /videos/status/{id}                  generation status
/// /videos/events                       server-sent lifecycle events
///
/// /payments/packages                   token packages (public)
/// /payments/createOrder                create a provider order (POST)
/// /payments/capturePayment             capture and credit (POST)
/// /payments/history                    caller's payments
/// /payments/tokens/balance             caller's balance
/// /payments/tokens/transactions        caller's ledger
///
/// /discoveries                         public feed, feature (admin POST)
/// /discoveries/available               unfeatured completed videos (admin)
/// /discoveries/{id}                    unfeature (admin DELETE)
/// /discoveries/{id}/order              reorder (admin PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/projects", project::router())
        .nest("/videos", video::router())
        .nest("/payments", payment::router())
        .nest("/discoveries", discovery::router())
}
