//! Handlers for token packages, payments, and the caller's token ledger.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;
use vidgen_core::error::CoreError;
use vidgen_core::payment::{PaymentProviderKind, PaymentStatus, DEFAULT_CURRENCY};
use vidgen_core::retry::{retry, RetryPolicy};
use vidgen_core::tokens::{find_package, TokenPackage, TOKEN_PACKAGES};
use vidgen_db::models::payment::{CreatePayment, Payment};
use vidgen_db::models::token::{TokenCredit, TokenTransaction};
use vidgen_db::repositories::{PaymentRepo, TokenError, TokenRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Attempts for crediting tokens after a successful capture: 1 s, then 2 s apart.
const CREDIT_RETRY: RetryPolicy = RetryPolicy::exponential(3, Duration::from_secs(1));

/// Statuses a capture may still move out of.
const CAPTURABLE: &[PaymentStatus] = &[
    PaymentStatus::Pending,
    PaymentStatus::Processing,
    PaymentStatus::Failed,
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Package ID is required"))]
    pub package_id: String,
    /// Must match the configured provider when given.
    pub provider: Option<PaymentProviderKind>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub approval_url: Option<String>,
    pub payment: Payment,
    pub package: TokenPackage,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CapturePaymentRequest {
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct CapturePaymentResponse {
    pub payment: Payment,
    pub tokens_added: i64,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

// ---------------------------------------------------------------------------
// Packages and orders
// ---------------------------------------------------------------------------

/// GET /api/payments/packages
pub async fn list_packages() -> Json<DataResponse<&'static [TokenPackage]>> {
    Json(DataResponse {
        data: TOKEN_PACKAGES,
    })
}

/// POST /api/payments/createOrder
pub async fn create_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreateOrderResponse>>)> {
    input.validate()?;
    let package = find_package(&input.package_id)?;

    let provider = &state.payment_provider;
    if let Some(requested) = input.provider {
        if requested != provider.kind() {
            return Err(AppError::BadRequest(format!(
                "Payment provider {requested} is not available"
            )));
        }
    }

    let order = provider.create_order(package).await?;
    let payment = PaymentRepo::create(
        &state.pool,
        &CreatePayment {
            user_id: auth.user_id,
            provider: provider.kind(),
            order_id: order.order_id.clone(),
            amount_cents: package.price_cents,
            currency: DEFAULT_CURRENCY.to_string(),
            tokens_purchased: package.tokens,
            package_id: package.id.to_string(),
        },
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        order_id = %order.order_id,
        package_id = package.id,
        provider = %provider.kind(),
        "Payment order created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreateOrderResponse {
                order_id: order.order_id,
                approval_url: order.approval_url,
                payment,
                package: *package,
            },
        }),
    ))
}

/// POST /api/payments/capturePayment
///
/// Captures an approved order and credits the package's tokens. Capturing an
/// order that already succeeded returns the stored payment without calling
/// the provider again.
pub async fn capture_payment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CapturePaymentRequest>,
) -> AppResult<Json<DataResponse<CapturePaymentResponse>>> {
    input.validate()?;

    let payment = PaymentRepo::find_by_order_id(&state.pool, &input.order_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundByKey {
                entity: "Payment",
                key: input.order_id.clone(),
            })
        })?;

    if !auth.can_access(payment.user_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot capture another user's payment".into(),
        )));
    }

    if payment.status == PaymentStatus::Succeeded {
        return already_captured(&state, payment).await;
    }

    let capture = match state.payment_provider.capture_order(&payment.order_id).await {
        Ok(capture) if capture.success => capture,
        Ok(capture) => {
            tracing::warn!(order_id = %payment.order_id, status = %capture.status, "Payment capture declined");
            return capture_failed(&state, payment, json!({ "capture_status": capture.status }))
                .await;
        }
        Err(e) => {
            tracing::error!(order_id = %payment.order_id, error = %e, "Payment capture errored");
            return capture_failed(&state, payment, json!({ "capture_error": e.to_string() }))
                .await;
        }
    };

    let transaction_id = capture
        .transaction_id
        .clone()
        .unwrap_or_else(|| payment.order_id.clone());
    let Some(payment) = PaymentRepo::transition(
        &state.pool,
        payment.id,
        CAPTURABLE,
        PaymentStatus::Succeeded,
        Some(&transaction_id),
        &json!({ "transaction_id": transaction_id, "capture_status": capture.status }),
    )
    .await?
    else {
        // A concurrent request recorded the capture first.
        return already_captured(&state, reload(&state, &payment).await?).await;
    };

    let credit = TokenCredit::purchase(
        payment.user_id,
        payment.tokens_purchased,
        format!("Purchase via {} payment {transaction_id}", payment.provider),
        payment.id.to_string(),
    );
    let pool = &state.pool;
    let credited = retry(
        &CREDIT_RETRY,
        |e: &TokenError| matches!(e, TokenError::Database(_)),
        |attempt| {
            let credit = &credit;
            async move {
                TokenRepo::add_tokens(pool, credit).await.inspect_err(|e| {
                    tracing::warn!(attempt, error = %e, "Token credit attempt failed");
                })
            }
        },
    )
    .await;

    match credited {
        Ok(outcome) => {
            tracing::info!(
                user_id = %payment.user_id,
                order_id = %payment.order_id,
                tokens = payment.tokens_purchased,
                balance = outcome.balance,
                duplicate = outcome.duplicate,
                "Payment captured and tokens credited",
            );
            let tokens_added = if outcome.duplicate {
                0
            } else {
                payment.tokens_purchased
            };
            Ok(Json(DataResponse {
                data: CapturePaymentResponse {
                    payment,
                    tokens_added,
                    balance: outcome.balance,
                },
            }))
        }
        Err(e) => {
            tracing::error!(order_id = %payment.order_id, error = %e, "Token credit exhausted retries");
            PaymentRepo::transition(
                &state.pool,
                payment.id,
                &[PaymentStatus::Succeeded],
                PaymentStatus::Failed,
                None,
                &json!({ "credit_error": e.to_string() }),
            )
            .await?;
            Err(AppError::InternalError(
                "Failed to add tokens to user account after multiple attempts".into(),
            ))
        }
    }
}

/// Response for an order whose capture is already recorded.
async fn already_captured(
    state: &AppState,
    payment: Payment,
) -> AppResult<Json<DataResponse<CapturePaymentResponse>>> {
    let balance = TokenRepo::get_balance(&state.pool, payment.user_id).await?;
    Ok(Json(DataResponse {
        data: CapturePaymentResponse {
            payment,
            tokens_added: 0,
            balance,
        },
    }))
}

/// Record a failed capture. A payment that succeeded in the meantime is
/// left alone and reported as captured.
async fn capture_failed(
    state: &AppState,
    payment: Payment,
    metadata: serde_json::Value,
) -> AppResult<Json<DataResponse<CapturePaymentResponse>>> {
    let failed = PaymentRepo::transition(
        &state.pool,
        payment.id,
        CAPTURABLE,
        PaymentStatus::Failed,
        None,
        &metadata,
    )
    .await?;

    if failed.is_none() {
        let current = reload(state, &payment).await?;
        if current.status == PaymentStatus::Succeeded {
            tracing::info!(order_id = %current.order_id, "Capture already recorded by another request");
            return already_captured(state, current).await;
        }
    }
    Err(AppError::PaymentFailed("Payment capture failed".into()))
}

async fn reload(state: &AppState, payment: &Payment) -> AppResult<Payment> {
    PaymentRepo::find_by_order_id(&state.pool, &payment.order_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Payment",
            id: payment.id,
        }))
}

// ---------------------------------------------------------------------------
// History and balance
// ---------------------------------------------------------------------------

/// GET /api/payments/history
pub async fn history(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<Payment>>>> {
    let (limit, offset) = params.clamped();
    let payments = PaymentRepo::list_by_user(&state.pool, auth.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: payments }))
}

/// GET /api/payments/tokens/balance
pub async fn balance(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<BalanceResponse>>> {
    let balance = TokenRepo::get_balance(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: BalanceResponse { balance },
    }))
}

/// GET /api/payments/tokens/transactions
pub async fn transactions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<TokenTransaction>>>> {
    let (limit, offset) = params.clamped();
    let rows = TokenRepo::transaction_history(&state.pool, auth.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: rows }))
}
