//! Payment entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use vidgen_core::payment::{PaymentProviderKind, PaymentStatus};
use vidgen_core::types::{DbId, Timestamp};

/// A row from the `payments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: DbId,
    pub user_id: DbId,
    #[sqlx(try_from = "String")]
    pub provider: PaymentProviderKind,
    /// Provider transaction id, set once captured.
    pub payment_id: Option<String>,
    pub order_id: String,
    pub amount_cents: i64,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub tokens_purchased: i64,
    pub package_id: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording a freshly created order.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: DbId,
    pub provider: PaymentProviderKind,
    pub order_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub tokens_purchased: i64,
    pub package_id: String,
}
