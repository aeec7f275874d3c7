//! In-process payment provider with no external calls.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;
use vidgen_core::payment::PaymentProviderKind;
use vidgen_core::tokens::TokenPackage;

use crate::error::PaymentError;
use crate::provider::{CaptureResult, CreatedOrder, PaymentProvider};

/// Provider that approves every order instantly.
///
/// Captures can be switched to decline with [`MockPaymentProvider::decline_captures`].
#[derive(Debug, Default)]
pub struct MockPaymentProvider {
    decline: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent captures report failure.
    pub fn decline_captures(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Mock
    }

    async fn create_order(&self, package: &TokenPackage) -> Result<CreatedOrder, PaymentError> {
        let order_id = format!("MOCK-ORDER-{}", Uuid::new_v4());
        tracing::debug!(order_id = %order_id, package_id = package.id, "Mock order created");
        Ok(CreatedOrder {
            order_id,
            approval_url: None,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PaymentError> {
        if self.decline.load(Ordering::SeqCst) {
            return Ok(CaptureResult {
                success: false,
                transaction_id: None,
                status: "DECLINED".to_string(),
            });
        }
        tracing::debug!(order_id, "Mock order captured");
        Ok(CaptureResult {
            success: true,
            transaction_id: Some(format!("MOCK-TX-{}", Uuid::new_v4())),
            status: "COMPLETED".to_string(),
        })
    }
}
