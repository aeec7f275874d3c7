/// Errors from a payment provider.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Payment provider error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// A 2xx response was missing a required field.
    #[error("Invalid payment provider response: {0}")]
    InvalidResponse(String),

    /// The provider is not configured for this deployment.
    #[error("Payment provider not configured: {0}")]
    NotConfigured(String),
}
