//! Token balance and ledger models.

use serde::Serialize;
use sqlx::FromRow;
use vidgen_core::tokens::TokenTransactionType;
use vidgen_core::types::{DbId, Timestamp};

/// A row from the append-only `token_transactions` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenTransaction {
    pub id: DbId,
    pub user_id: DbId,
    #[sqlx(try_from = "String")]
    pub transaction_type: TokenTransactionType,
    /// Signed: credits are positive, debits negative.
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub payment_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// A credit to apply to a user's balance.
#[derive(Debug, Clone)]
pub struct TokenCredit {
    pub user_id: DbId,
    pub amount: i64,
    pub transaction_type: TokenTransactionType,
    pub description: String,
    /// Purchases carrying the same payment id are credited once.
    pub payment_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl TokenCredit {
    /// A `purchase` credit keyed by `payment_id`.
    pub fn purchase(
        user_id: DbId,
        amount: i64,
        description: impl Into<String>,
        payment_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            amount,
            transaction_type: TokenTransactionType::Purchase,
            description: description.into(),
            payment_id: Some(payment_id.into()),
            metadata: serde_json::json!({}),
        }
    }
}

/// Result of [`TokenRepo::add_tokens`](crate::repositories::TokenRepo::add_tokens).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditOutcome {
    pub balance: i64,
    /// The payment id had already been credited; nothing changed.
    pub duplicate: bool,
}

/// Result of [`TokenRepo::use_tokens`](crate::repositories::TokenRepo::use_tokens).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { balance: i64 },
    Insufficient { available: i64, required: i64 },
}
