//! Repository for the `payments` table.

use sqlx::PgPool;
use vidgen_core::payment::PaymentStatus;
use vidgen_core::types::DbId;

use crate::models::payment::{CreatePayment, Payment};

const COLUMNS: &str = "id, user_id, provider, payment_id, order_id, amount_cents, currency, \
    status, tokens_purchased, package_id, metadata, created_at, updated_at";

/// Provides persistence for payment orders and their captures.
pub struct PaymentRepo;

impl PaymentRepo {
    /// Record a newly created provider order in `PENDING` status.
    pub async fn create(pool: &PgPool, input: &CreatePayment) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "INSERT INTO payments
                (user_id, provider, order_id, amount_cents, currency, tokens_purchased, package_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(input.user_id)
            .bind(input.provider.as_str())
            .bind(&input.order_id)
            .bind(input.amount_cents)
            .bind(&input.currency)
            .bind(input.tokens_purchased)
            .bind(&input.package_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_order_id(
        pool: &PgPool,
        order_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE order_id = $1");
        sqlx::query_as::<_, Payment>(&query)
            .bind(order_id)
            .fetch_optional(pool)
            .await
    }

    /// Move a payment to `to` if its current status is one of `from`,
    /// setting the provider transaction id when given and merging
    /// `metadata` into the stored object.
    ///
    /// Returns `None` when the row is missing or has already left every
    /// status in `from`, e.g. a concurrent capture marked it `SUCCEEDED`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: &[PaymentStatus],
        to: PaymentStatus,
        payment_id: Option<&str>,
        metadata: &serde_json::Value,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let allowed_from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let query = format!(
            "UPDATE payments SET
                status = $2,
                payment_id = COALESCE($3, payment_id),
                metadata = metadata || $4
             WHERE id = $1 AND status = ANY($5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .bind(to.as_str())
            .bind(payment_id)
            .bind(metadata)
            .bind(&allowed_from)
            .fetch_optional(pool)
            .await
    }

    /// A user's payments, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payments
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
