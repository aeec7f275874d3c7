//! Payment providers used to sell token packages.
//!
//! - [`provider::PaymentProvider`]: create and capture orders.
//! - [`paypal::PayPalApi`]: PayPal Orders v2 over REST.
//! - [`mock::MockPaymentProvider`]: always-available provider for local use
//!   and tests.

pub mod error;
pub mod mock;
pub mod paypal;
pub mod provider;

pub use error::PaymentError;
pub use mock::MockPaymentProvider;
pub use paypal::{PayPalApi, PayPalConfig, PayPalMode};
pub use provider::{CaptureResult, CreatedOrder, PaymentProvider};
