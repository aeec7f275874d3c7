use std::time::Duration;

use vidgen_core::payment::PaymentProviderKind;
use vidgen_core::polling::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use vidgen_runway::api::DEFAULT_API_URL;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to drain after the server stops (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Video provider base URL.
    pub runway_api_url: String,
    /// Video provider API key. Empty disables submission (jobs fail fast).
    pub runway_api_key: String,
    /// Which payment provider sells token packages.
    pub payment_provider: PaymentProviderKind,
    /// Delay between provider status checks for one generation.
    pub generation_poll_interval: Duration,
    /// Provider status checks before a generation is declared timed out.
    pub generation_max_attempts: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                         |
    /// |---------------------------------|---------------------------------|
    /// | `HOST`                          | `0.0.0.0`                       |
    /// | `PORT`                          | `3000`                          |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173`         |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                            |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`                            |
    /// | `RUNWAY_API_URL`                | `https://api.dev.runwayml.com`  |
    /// | `RUNWAY_API_KEY`                | empty                           |
    /// | `PAYMENT_PROVIDER`              | `paypal` if credentials exist, else `mock` |
    /// | `GENERATION_POLL_INTERVAL_SECS` | `5`                             |
    /// | `GENERATION_MAX_ATTEMPTS`       | `60`                            |
    ///
    /// JWT settings come from [`JwtConfig::from_env`]; PayPal credentials
    /// from `vidgen_payments::PayPalConfig::from_env`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let runway_api_url =
            std::env::var("RUNWAY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let runway_api_key = std::env::var("RUNWAY_API_KEY").unwrap_or_default();

        let payment_provider = match std::env::var("PAYMENT_PROVIDER") {
            Ok(value) => value
                .parse::<PaymentProviderKind>()
                .expect("PAYMENT_PROVIDER must be `mock` or `paypal`"),
            Err(_) if vidgen_payments::PayPalConfig::from_env().is_some() => {
                PaymentProviderKind::Paypal
            }
            Err(_) => PaymentProviderKind::Mock,
        };

        let generation_poll_interval = std::env::var("GENERATION_POLL_INTERVAL_SECS")
            .ok()
            .map(|v| {
                v.parse::<u64>()
                    .expect("GENERATION_POLL_INTERVAL_SECS must be a valid u64")
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let generation_max_attempts: u32 = std::env::var("GENERATION_MAX_ATTEMPTS")
            .ok()
            .map(|v| v.parse().expect("GENERATION_MAX_ATTEMPTS must be a valid u32"))
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            runway_api_url,
            runway_api_key,
            payment_provider,
            generation_poll_interval,
            generation_max_attempts,
        }
    }
}
