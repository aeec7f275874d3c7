use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidgen_api::config::ServerConfig;
use vidgen_api::engine::GenerationTracker;
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_core::payment::PaymentProviderKind;
use vidgen_payments::{MockPaymentProvider, PayPalApi, PayPalConfig, PaymentProvider};
use vidgen_runway::RunwayApi;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vidgen_api=debug,vidgen_runway=info,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = vidgen_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    vidgen_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    vidgen_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(vidgen_events::EventBus::default());

    // --- Video provider + tracker ---
    if config.runway_api_key.is_empty() {
        tracing::warn!("RUNWAY_API_KEY is not set; submitted generations will fail");
    }
    let provider = Arc::new(RunwayApi::new(
        config.runway_api_url.clone(),
        config.runway_api_key.clone(),
    ));
    let tracker = Arc::new(GenerationTracker::with_budget(
        pool.clone(),
        provider,
        Arc::clone(&event_bus),
        config.generation_poll_interval,
        config.generation_max_attempts,
    ));
    match tracker.resume_in_flight().await {
        Ok(count) => tracing::info!(count, "Generation tracker started"),
        Err(e) => tracing::error!(error = %e, "Failed to resume in-flight generations"),
    }

    // --- Payment provider ---
    let payment_provider: Arc<dyn PaymentProvider> = match config.payment_provider {
        PaymentProviderKind::Paypal => {
            let paypal = PayPalConfig::from_env()
                .expect("PAYMENT_PROVIDER=paypal requires PayPal client credentials");
            tracing::info!(mode = ?paypal.mode, "Using PayPal payment provider");
            Arc::new(PayPalApi::new(paypal))
        }
        PaymentProviderKind::Mock => {
            tracing::warn!("Using mock payment provider; captures always succeed");
            Arc::new(MockPaymentProvider::new())
        }
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
        payment_provider,
        tracker: Arc::clone(&tracker),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, tracker.shutdown()).await.is_err() {
        tracing::warn!(
            remaining = tracker.active_count(),
            "Generation tracker did not stop in time"
        );
    } else {
        tracing::info!("Generation tracker stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
