//! Repository for `user_tokens` and the `token_transactions` ledger.
//!
//! Every balance change and its ledger row are written in one transaction
//! while holding a row lock on the user's balance, so the balance always
//! equals the sum of the ledger.

use sqlx::{PgConnection, PgPool};
use vidgen_core::error::CoreError;
use vidgen_core::tokens::{validate_amount, TokenTransactionType};
use vidgen_core::types::DbId;

use crate::models::token::{CreditOutcome, DebitOutcome, TokenCredit, TokenTransaction};

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, amount, balance_after, \
    description, payment_id, metadata, created_at";

/// Partial unique index guarding against crediting a payment twice.
const PURCHASE_PAYMENT_CONSTRAINT: &str = "uq_token_transactions_purchase_payment";

/// Failure of a balance-changing operation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Rejected before touching the database (non-positive amount).
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Token balance and ledger operations.
pub struct TokenRepo;

impl TokenRepo {
    /// Current balance for `user_id`, creating a zero balance on first use.
    pub async fn get_balance(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_tokens (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        sqlx::query_scalar::<_, i64>("SELECT balance FROM user_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Credit tokens and append the ledger row atomically.
    ///
    /// A `purchase` whose `payment_id` was already credited leaves the
    /// balance untouched and reports `duplicate: true`. Non-positive amounts
    /// are rejected with [`TokenError::Invalid`].
    pub async fn add_tokens(pool: &PgPool, credit: &TokenCredit) -> Result<CreditOutcome, TokenError> {
        validate_amount(credit.amount)?;

        let mut tx = pool.begin().await?;
        let current = Self::lock_balance(&mut *tx, credit.user_id).await?;

        if let (TokenTransactionType::Purchase, Some(payment_id)) =
            (credit.transaction_type, &credit.payment_id)
        {
            let already_credited = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (
                    SELECT 1 FROM token_transactions
                    WHERE payment_id = $1 AND transaction_type = 'purchase'
                 )",
            )
            .bind(payment_id)
            .fetch_one(&mut *tx)
            .await?;

            if already_credited {
                tracing::info!(
                    user_id = %credit.user_id,
                    payment_id = %payment_id,
                    "Payment already credited, skipping",
                );
                tx.rollback().await?;
                return Ok(CreditOutcome {
                    balance: current,
                    duplicate: true,
                });
            }
        }

        let balance = current + credit.amount;
        let appended = Self::apply(
            &mut *tx,
            credit.user_id,
            credit.transaction_type,
            credit.amount,
            balance,
            &credit.description,
            credit.payment_id.as_deref(),
            &credit.metadata,
        )
        .await;

        match appended {
            Ok(()) => {}
            // Another user's purchase raced us with the same payment id.
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some(PURCHASE_PAYMENT_CONSTRAINT) =>
            {
                tx.rollback().await?;
                return Ok(CreditOutcome {
                    balance: Self::get_balance(pool, credit.user_id).await?,
                    duplicate: true,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(CreditOutcome {
            balance,
            duplicate: false,
        })
    }

    /// Debit `amount` tokens, appending a negative `usage` ledger row.
    ///
    /// Never debits partially: if the balance cannot cover `amount` nothing
    /// is written and [`DebitOutcome::Insufficient`] is returned.
    pub async fn use_tokens(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        description: &str,
    ) -> Result<DebitOutcome, TokenError> {
        validate_amount(amount)?;

        let mut tx = pool.begin().await?;
        let available = Self::lock_balance(&mut *tx, user_id).await?;

        if amount > available {
            tx.rollback().await?;
            return Ok(DebitOutcome::Insufficient {
                available,
                required: amount,
            });
        }

        let balance = available - amount;
        Self::apply(
            &mut *tx,
            user_id,
            TokenTransactionType::Usage,
            -amount,
            balance,
            description,
            None,
            &serde_json::json!({}),
        )
        .await?;

        tx.commit().await?;
        Ok(DebitOutcome::Debited { balance })
    }

    /// Ledger rows for `user_id`, newest first.
    pub async fn transaction_history(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TokenTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM token_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, TokenTransaction>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    // ---- private helpers ----

    /// Lock the user's balance row for the rest of the transaction,
    /// creating it at zero if absent.
    async fn lock_balance(conn: &mut PgConnection, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_tokens (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query_scalar::<_, i64>(
            "SELECT balance FROM user_tokens WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
    }

    /// Write the new balance and append the matching ledger row.
    #[allow(clippy::too_many_arguments)]
    async fn apply(
        conn: &mut PgConnection,
        user_id: DbId,
        transaction_type: TokenTransactionType,
        amount: i64,
        balance_after: i64,
        description: &str,
        payment_id: Option<&str>,
        metadata: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE user_tokens SET balance = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(balance_after)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO token_transactions
                (user_id, transaction_type, amount, balance_after, description, payment_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user_id)
        .bind(transaction_type.as_str())
        .bind(amount)
        .bind(balance_after)
        .bind(description)
        .bind(payment_id)
        .bind(metadata)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
