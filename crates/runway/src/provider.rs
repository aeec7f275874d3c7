//! The video provider trait.

use async_trait::async_trait;
use vidgen_core::generation::GenerationStatus;

use crate::api::RunwayApiError;

/// Snapshot of a provider task, already mapped onto our lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    /// Mapped status. A provider-side success maps to `processing`: the
    /// tracker still has to record the output before completing.
    pub status: GenerationStatus,
    /// Raw status string as reported by the provider.
    pub raw_status: String,
    pub output_url: Option<String>,
    pub failure: Option<String>,
}

/// An external service that turns an image and a prompt into a video.
///
/// Object-safe so it can be held as `Arc<dyn VideoProvider>`.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Start a generation, returning the provider's task id.
    async fn submit(&self, image_url: &str, prompt: &str) -> Result<String, RunwayApiError>;

    /// Poll a previously submitted task.
    async fn status(&self, task_id: &str) -> Result<ProviderStatus, RunwayApiError>;

    /// Model identifier recorded on each generation.
    fn model_id(&self) -> &str;
}
