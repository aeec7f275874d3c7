//! The payment provider trait.

use async_trait::async_trait;
use serde::Serialize;
use vidgen_core::payment::PaymentProviderKind;
use vidgen_core::tokens::TokenPackage;

use crate::error::PaymentError;

/// An order created with the provider, awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedOrder {
    pub order_id: String,
    /// Where the buyer approves the order, when the provider has one.
    pub approval_url: Option<String>,
}

/// Outcome of capturing an approved order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub success: bool,
    pub transaction_id: Option<String>,
    /// Provider-reported order status, e.g. `COMPLETED`.
    pub status: String,
}

/// A backend able to charge the buyer for a token package.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> PaymentProviderKind;

    async fn create_order(&self, package: &TokenPackage) -> Result<CreatedOrder, PaymentError>;

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PaymentError>;
}
