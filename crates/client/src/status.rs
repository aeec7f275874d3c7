//! A single generation status check.

use std::sync::Arc;

use crate::api::{GenerationStatusReport, VideoApi};
use crate::error::ClientError;

/// Validates the generation id, then asks the server once.
#[derive(Clone)]
pub struct StatusEndpointClient {
    api: Arc<dyn VideoApi>,
}

impl StatusEndpointClient {
    pub fn new(api: Arc<dyn VideoApi>) -> Self {
        Self { api }
    }

    /// Fetch the current status. An empty id fails without any I/O.
    pub async fn check_status(
        &self,
        generation_id: &str,
    ) -> Result<GenerationStatusReport, ClientError> {
        let generation_id = generation_id.trim();
        if generation_id.is_empty() {
            return Err(ClientError::Validation("Generation ID is required".into()));
        }

        self.api.check_status(generation_id).await.inspect_err(|e| {
            tracing::debug!(generation_id, error = %e, "Status check failed");
        })
    }
}
