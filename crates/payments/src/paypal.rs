//! PayPal Orders v2 REST client.
//!
//! Access tokens come from the OAuth2 client-credentials flow and are cached
//! until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use vidgen_core::payment::{format_cents, PaymentProviderKind, DEFAULT_CURRENCY};
use vidgen_core::tokens::TokenPackage;

use crate::error::PaymentError;
use crate::provider::{CaptureResult, CreatedOrder, PaymentProvider};

const SANDBOX_API_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_API_URL: &str = "https://api-m.paypal.com";

/// Tokens are refreshed this long before PayPal's stated expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Which PayPal environment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalMode {
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn api_url(self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_API_URL,
            Self::Live => LIVE_API_URL,
        }
    }
}

/// Credentials and endpoint for the PayPal REST API.
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub mode: PayPalMode,
    pub client_id: String,
    pub client_secret: String,
}

impl PayPalConfig {
    /// Load PayPal configuration from environment variables.
    ///
    /// | Env Var                        | Default    |
    /// |--------------------------------|------------|
    /// | `PAYPAL_MODE`                  | `sandbox`  |
    /// | `PAYPAL_SANDBOX_CLIENT_ID`     | --         |
    /// | `PAYPAL_SANDBOX_CLIENT_SECRET` | --         |
    /// | `PAYPAL_LIVE_CLIENT_ID`        | --         |
    /// | `PAYPAL_LIVE_CLIENT_SECRET`    | --         |
    ///
    /// Returns `None` when the credentials for the selected mode are missing.
    pub fn from_env() -> Option<Self> {
        let mode = match std::env::var("PAYPAL_MODE").as_deref() {
            Ok("live") | Ok("production") => PayPalMode::Live,
            _ => PayPalMode::Sandbox,
        };
        let prefix = match mode {
            PayPalMode::Sandbox => "PAYPAL_SANDBOX",
            PayPalMode::Live => "PAYPAL_LIVE",
        };

        let client_id = std::env::var(format!("{prefix}_CLIENT_ID")).ok()?;
        let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            mode,
            client_id,
            client_secret,
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<serde_json::Value>,
}

/// PayPal REST client implementing [`PaymentProvider`].
pub struct PayPalApi {
    client: reqwest::Client,
    config: PayPalConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalApi {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.mode.api_url(), path)
    }

    /// Return a cached access token or fetch a new one.
    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = Self::parse_response(response).await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PaymentError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Order body for a token package.
fn order_body(package: &TokenPackage) -> serde_json::Value {
    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "amount": {
                "currency_code": DEFAULT_CURRENCY,
                "value": format_cents(package.price_cents),
            },
            "description": format!("Purchase of {} tokens", package.tokens),
        }],
    })
}

/// Transaction id at `purchase_units[0].payments.captures[0].id`.
fn capture_transaction_id(purchase_units: &[serde_json::Value]) -> Option<String> {
    purchase_units
        .first()?
        .pointer("/payments/captures/0/id")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl PaymentProvider for PayPalApi {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Paypal
    }

    async fn create_order(&self, package: &TokenPackage) -> Result<CreatedOrder, PaymentError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&order_body(package))
            .send()
            .await?;
        let order: OrderResponse = Self::parse_response(response).await?;

        tracing::info!(order_id = %order.id, package_id = package.id, "PayPal order created");

        let approval_url = order
            .links
            .into_iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href);

        Ok(CreatedOrder {
            order_id: order.id,
            approval_url,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PaymentError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{order_id}/capture")))
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await?;
        let order: OrderResponse = Self::parse_response(response).await?;

        let transaction_id = capture_transaction_id(&order.purchase_units);
        let success = order.status == "COMPLETED";
        if success && transaction_id.is_none() {
            return Err(PaymentError::InvalidResponse(
                "completed capture without a capture id".into(),
            ));
        }

        tracing::info!(order_id, status = %order.status, "PayPal order captured");
        Ok(CaptureResult {
            success,
            transaction_id,
            status: order.status,
        })
    }
}
