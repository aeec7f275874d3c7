//! Per-generation background tasks driving the video provider.
//!
//! Every tracked generation gets one task. The task submits the job (unless
//! it is being resumed), then polls the provider until a terminal outcome or
//! until the attempt budget is spent. All status writes go through
//! [`GenerationRepo::transition`], so a generation that already reached a
//! terminal state is never moved again.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vidgen_core::generation::{GenerationStatus, GENERATION_FAILED_MESSAGE};
use vidgen_core::polling::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use vidgen_core::tokens::VIDEO_GENERATION_TOKEN_COST;
use vidgen_db::models::generation::{Generation, GenerationUpdate};
use vidgen_db::models::token::DebitOutcome;
use vidgen_db::repositories::{GenerationRepo, TokenRepo};
use vidgen_events::{EventBus, GenerationEvent, GenerationEventKind};
use vidgen_runway::VideoProvider;

pub const GENERATION_TIMEOUT_MESSAGE: &str = "Generation timed out after 5 minutes";
pub const NO_VIDEO_URL_MESSAGE: &str = "No video URL received from provider";
const MISSING_IMAGE_MESSAGE: &str = "Generation has no source image";

/// Spawns and supervises one polling task per in-flight generation.
pub struct GenerationTracker {
    ctx: Arc<TrackerContext>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

struct TrackerContext {
    pool: PgPool,
    provider: Arc<dyn VideoProvider>,
    event_bus: Arc<EventBus>,
    poll_interval: Duration,
    max_attempts: u32,
}

/// How a tracking task ended.
enum Outcome {
    Completed,
    Failed,
    /// The row was moved by someone else; nothing left to do.
    Superseded,
    Cancelled,
}

impl GenerationTracker {
    /// Create a tracker polling every 5 s for up to 60 attempts.
    pub fn new(pool: PgPool, provider: Arc<dyn VideoProvider>, event_bus: Arc<EventBus>) -> Self {
        Self::with_budget(
            pool,
            provider,
            event_bus,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_MAX_ATTEMPTS,
        )
    }

    pub fn with_budget(
        pool: PgPool,
        provider: Arc<dyn VideoProvider>,
        event_bus: Arc<EventBus>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            ctx: Arc::new(TrackerContext {
                pool,
                provider,
                event_bus,
                poll_interval,
                max_attempts,
            }),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Model id the provider stamps on new generations.
    pub fn model_id(&self) -> String {
        self.ctx.provider.model_id().to_string()
    }

    /// Start driving `generation` in the background.
    pub fn track(&self, generation: Generation) {
        let ctx = Arc::clone(&self.ctx);
        let cancel = self.cancel.child_token();
        self.tasks.spawn(async move {
            let generation_id = generation.id;
            let outcome = ctx.drive(generation, cancel).await;
            match outcome {
                Ok(Outcome::Completed) => {
                    tracing::info!(%generation_id, "Generation completed");
                }
                Ok(Outcome::Failed) => {
                    tracing::info!(%generation_id, "Generation failed");
                }
                Ok(Outcome::Superseded) => {
                    tracing::debug!(%generation_id, "Generation moved elsewhere, tracking stopped");
                }
                Ok(Outcome::Cancelled) => {
                    tracing::info!(%generation_id, "Generation tracking cancelled, will resume on restart");
                }
                Err(e) => {
                    tracing::error!(%generation_id, error = %e, "Generation tracking aborted");
                }
            }
        });
    }

    /// Re-attach to generations that were submitted before a restart.
    pub async fn resume_in_flight(&self) -> Result<usize, sqlx::Error> {
        let in_flight = GenerationRepo::list_in_flight(&self.ctx.pool).await?;
        let count = in_flight.len();
        for generation in in_flight {
            self.track(generation);
        }
        if count > 0 {
            tracing::info!(count, "Resumed tracking of in-flight generations");
        }
        Ok(count)
    }

    /// Number of tracking tasks still running.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every tracking task and wait for them to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

impl TrackerContext {
    async fn drive(
        &self,
        generation: Generation,
        cancel: CancellationToken,
    ) -> Result<Outcome, sqlx::Error> {
        let mut current = generation;

        let task_id = match current.provider_job_id.clone() {
            Some(task_id) => task_id,
            None => {
                let Some(image_url) = current
                    .metadata
                    .get("image_url")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned)
                else {
                    return self.fail(&current, MISSING_IMAGE_MESSAGE).await;
                };

                let task_id = match self.provider.submit(&image_url, &current.prompt).await {
                    Ok(task_id) => task_id,
                    Err(e) => {
                        tracing::error!(
                            generation_id = %current.id,
                            error = %e,
                            "Failed to submit generation to provider",
                        );
                        return self.fail(&current, GENERATION_FAILED_MESSAGE).await;
                    }
                };
                tracing::info!(generation_id = %current.id, task_id = %task_id, "Generation submitted");

                let update = GenerationUpdate {
                    provider_job_id: Some(task_id.clone()),
                    ..Default::default()
                };
                match self.advance(&current, GenerationStatus::Preparing, update).await? {
                    Some(updated) => current = updated,
                    None => return Ok(Outcome::Superseded),
                }
                task_id
            }
        };

        let mut attempts = 0u32;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            attempts += 1;
            if attempts > self.max_attempts {
                tracing::warn!(
                    generation_id = %current.id,
                    attempts = self.max_attempts,
                    "Provider polling budget exhausted",
                );
                return self.fail(&current, GENERATION_TIMEOUT_MESSAGE).await;
            }

            let report = match self.provider.status(&task_id).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(
                        generation_id = %current.id,
                        attempt = attempts,
                        error = %e,
                        "Provider status check failed, retrying",
                    );
                    continue;
                }
            };
            tracing::debug!(
                generation_id = %current.id,
                raw_status = %report.raw_status,
                status = %report.status,
                "Provider status",
            );

            match report.status {
                GenerationStatus::Failed => {
                    let message = report
                        .failure
                        .unwrap_or_else(|| GENERATION_FAILED_MESSAGE.to_string());
                    return self.fail(&current, &message).await;
                }
                GenerationStatus::Processing | GenerationStatus::Completed => {
                    let Some(video_url) = report.output_url else {
                        return self.fail(&current, NO_VIDEO_URL_MESSAGE).await;
                    };
                    return self.complete(current, video_url).await;
                }
                GenerationStatus::Generating if current.status == GenerationStatus::Preparing => {
                    match self
                        .advance(&current, GenerationStatus::Generating, GenerationUpdate::default())
                        .await?
                    {
                        Some(updated) => current = updated,
                        None => return Ok(Outcome::Superseded),
                    }
                }
                _ => {}
            }
        }
    }

    /// Walk the row forward to `completed`, then charge the owner.
    async fn complete(
        &self,
        mut current: Generation,
        video_url: String,
    ) -> Result<Outcome, sqlx::Error> {
        while current.status != GenerationStatus::Completed {
            let Some(next) = next_step(current.status) else {
                return Ok(Outcome::Superseded);
            };
            let update = if next == GenerationStatus::Completed {
                GenerationUpdate {
                    video_url: Some(video_url.clone()),
                    ..Default::default()
                }
            } else {
                GenerationUpdate::default()
            };
            match self.advance(&current, next, update).await? {
                Some(updated) => current = updated,
                None => return Ok(Outcome::Superseded),
            }
        }

        let description = format!("Video generation: {}", current.id);
        match TokenRepo::use_tokens(
            &self.pool,
            current.user_id,
            VIDEO_GENERATION_TOKEN_COST,
            &description,
        )
        .await
        {
            Ok(DebitOutcome::Debited { balance }) => {
                tracing::info!(user_id = %current.user_id, balance, "Charged for video generation");
            }
            Ok(DebitOutcome::Insufficient { available, required }) => {
                tracing::warn!(
                    user_id = %current.user_id,
                    available,
                    required,
                    "Balance too low to charge for completed generation",
                );
            }
            Err(e) => {
                tracing::error!(
                    user_id = %current.user_id,
                    error = %e,
                    "Failed to charge for completed generation",
                );
            }
        }

        Ok(Outcome::Completed)
    }

    /// Apply one guarded transition and announce it.
    async fn advance(
        &self,
        current: &Generation,
        to: GenerationStatus,
        update: GenerationUpdate,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let updated = GenerationRepo::transition(&self.pool, current.id, to, &update).await?;
        if let Some(row) = &updated {
            let mut event = GenerationEvent::new(
                GenerationEventKind::StatusChanged,
                row.id,
                row.project_id,
                row.user_id,
                row.status,
            )
            .with_transition(current.status);
            if let Some(url) = &row.video_url {
                event = event.with_video_url(url.clone());
            }
            self.event_bus.publish(event);
        }
        Ok(updated)
    }

    async fn fail(&self, current: &Generation, message: &str) -> Result<Outcome, sqlx::Error> {
        let Some(row) = GenerationRepo::fail(&self.pool, current.id, message).await? else {
            return Ok(Outcome::Superseded);
        };
        self.event_bus.publish(
            GenerationEvent::new(
                GenerationEventKind::StatusChanged,
                row.id,
                row.project_id,
                row.user_id,
                row.status,
            )
            .with_transition(current.status)
            .with_error(message),
        );
        Ok(Outcome::Failed)
    }
}

/// The non-failure successor of `status`, if any.
fn next_step(status: GenerationStatus) -> Option<GenerationStatus> {
    status
        .allowed_transitions()
        .iter()
        .copied()
        .find(|s| *s != GenerationStatus::Failed)
}
