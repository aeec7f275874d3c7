//! Video generation provider integration.
//!
//! - [`provider::VideoProvider`]: the seam the server's generation tracker
//!   talks to.
//! - [`api::RunwayApi`]: REST client for Runway's image-to-video tasks.

pub mod api;
pub mod provider;
pub mod status;

pub use api::{RunwayApi, RunwayApiError};
pub use provider::{ProviderStatus, VideoProvider};
