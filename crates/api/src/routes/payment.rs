//! Route definitions for `/payments`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payment;
use crate::state::AppState;

/// Routes mounted at `/payments`.
///
/// ```text
/// GET    /packages               -> list_packages
/// POST   /createOrder            -> create_order
/// POST   /capturePayment         -> capture_payment
/// GET    /history                -> history
/// GET    /tokens/balance         -> balance
/// GET    /tokens/transactions    -> transactions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/packages", get(payment::list_packages))
        .route("/createOrder", post(payment::create_order))
        .route("/capturePayment", post(payment::capture_payment))
        .route("/history", get(payment::history))
        .route("/tokens/balance", get(payment::balance))
        .route("/tokens/transactions", get(payment::transactions))
}
