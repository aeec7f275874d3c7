//! Payment status and provider vocabulary.

crate::define_text_enum! {
    /// Lifecycle of a `payments` row.
    PaymentStatus {
        Pending = "PENDING",
        Processing = "PROCESSING",
        Succeeded = "SUCCEEDED",
        Failed = "FAILED",
        Cancelled = "CANCELLED",
    }
}

crate::define_text_enum! {
    /// Which payment backend handled an order.
    PaymentProviderKind {
        Mock = "mock",
        Paypal = "paypal",
    }
}

/// Currency every order is priced in.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Render an amount in cents as a decimal string (`1050` -> `"10.50"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
