use std::sync::Arc;

use vidgen_payments::PaymentProvider;

use crate::config::ServerConfig;
use crate::engine::GenerationTracker;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: vidgen_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Generation lifecycle events, fanned out to SSE subscribers.
    pub event_bus: Arc<vidgen_events::EventBus>,
    /// Sells token packages (PayPal or mock).
    pub payment_provider: Arc<dyn PaymentProvider>,
    /// Drives submitted generations through the video provider.
    pub tracker: Arc<GenerationTracker>,
}
