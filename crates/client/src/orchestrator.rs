//! Prompt to finished video: project resolution, submission, polling.
//!
//! [`GenerationOrchestrator`] publishes its state as a [`GenerationSnapshot`]
//! on a `watch` channel and reports outcomes through [`GenerationCallbacks`].

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use vidgen_core::generation::{GenerationStatus, GENERATION_FAILED_MESSAGE};
use vidgen_core::polling::PollBudget;
use vidgen_core::retry::{retry, RetryPolicy};
use vidgen_core::types::DbId;

use crate::api::{GenerationRequest, GenerationStatusReport, NewProject, VideoApi};
use crate::cache::QueryCache;
use crate::error::ClientError;
use crate::polling::{PollEvent, StatusPoller};
use crate::status::StatusEndpointClient;

pub const EMPTY_PROMPT_MESSAGE: &str = "Please enter a prompt";
pub const PROJECT_RETRIES_EXHAUSTED: &str = "Failed to create project after multiple attempts";
pub const SUBMIT_RETRIES_EXHAUSTED: &str = "Failed to generate video after multiple attempts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// Hooks for the caller. Every method defaults to doing nothing.
pub trait GenerationCallbacks: Send + Sync {
    fn on_progress(&self, _progress: u8, _status: GenerationStatus) {}
    fn on_success(&self, _video_url: &str) {}
    fn on_error(&self, _message: &str) {}
    fn on_insufficient_credits(&self, _message: &str) {}
    fn on_generation_complete(&self) {}
    fn toast(&self, _level: ToastLevel, _message: &str) {}
}

/// Callbacks that ignore everything.
pub struct NoopCallbacks;

impl GenerationCallbacks for NoopCallbacks {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSnapshot {
    pub prompt: String,
    pub is_generating: bool,
    pub progress: u8,
    pub status: Option<GenerationStatus>,
    pub error: Option<String>,
    pub video_url: Option<String>,
    pub generation_id: Option<String>,
    pub project_id: Option<DbId>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Project to generate into. A new one is created when absent.
    pub project_id: Option<DbId>,
    /// Source image sent with new projects and generation requests.
    pub image_url: Option<String>,
    pub retry: RetryPolicy,
    pub budget: PollBudget,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            image_url: None,
            retry: RetryPolicy::default(),
            budget: PollBudget::default(),
        }
    }
}

struct Inner {
    api: Arc<dyn VideoApi>,
    cache: Arc<QueryCache>,
    callbacks: Arc<dyn GenerationCallbacks>,
    options: OrchestratorOptions,
    poller: StatusPoller,
    state: watch::Sender<GenerationSnapshot>,
    /// Project resolved or created by an earlier run.
    project_ref: Mutex<Option<DbId>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    inner: Arc<Inner>,
}

impl GenerationOrchestrator {
    pub fn new(
        api: Arc<dyn VideoApi>,
        cache: Arc<QueryCache>,
        callbacks: Arc<dyn GenerationCallbacks>,
        options: OrchestratorOptions,
    ) -> Self {
        let poller = StatusPoller::new(StatusEndpointClient::new(Arc::clone(&api)), options.budget);
        let (state, _) = watch::channel(GenerationSnapshot {
            project_id: options.project_id,
            ..GenerationSnapshot::default()
        });
        Self {
            inner: Arc::new(Inner {
                api,
                cache,
                callbacks,
                options,
                poller,
                state,
                project_ref: Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> GenerationSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.inner.state.send_modify(|s| s.prompt = prompt);
    }

    pub fn set_project(&self, project_id: DbId) {
        *lock(&self.inner.project_ref) = Some(project_id);
        self.inner.state.send_modify(|s| s.project_id = Some(project_id));
    }

    /// Submit the current prompt and start tracking the generation.
    ///
    /// Returns the generation id once submitted; the rest of the lifecycle
    /// arrives through the snapshot and callbacks.
    pub async fn handle_generate(&self) -> Result<String, ClientError> {
        let prompt = self.inner.state.borrow().prompt.trim().to_string();
        if prompt.is_empty() {
            let err = ClientError::Validation(EMPTY_PROMPT_MESSAGE.into());
            self.inner.state.send_modify(|s| s.error = Some(err.to_string()));
            self.inner.report_error(&err);
            return Err(err);
        }

        self.inner.stop_tracking();
        self.inner.state.send_modify(|s| {
            s.is_generating = true;
            s.progress = 0;
            s.status = None;
            s.error = None;
            s.video_url = None;
            s.generation_id = None;
        });

        match self.submit(&prompt).await {
            Ok(generation_id) => Ok(generation_id),
            Err(err) => {
                self.inner.state.send_modify(|s| {
                    s.is_generating = false;
                    s.progress = 0;
                    s.error = Some(err.to_string());
                });
                // A project may have been created before the failure.
                self.inner.cache.invalidate_all();
                self.inner.report_error(&err);
                Err(err)
            }
        }
    }

    /// Clear everything but the project and stop any polling.
    pub fn reset(&self) {
        self.inner.stop_tracking();
        self.inner.state.send_modify(|s| {
            *s = GenerationSnapshot {
                project_id: s.project_id,
                ..GenerationSnapshot::default()
            };
        });
    }

    async fn submit(&self, prompt: &str) -> Result<String, ClientError> {
        let inner = &self.inner;
        let project_id = self.resolve_project().await?;

        let metadata = match &inner.options.image_url {
            Some(url) => serde_json::json!({ "image_url": url }),
            None => serde_json::json!({}),
        };
        let request = GenerationRequest {
            project_id,
            prompt: prompt.to_string(),
            metadata,
        };

        let api = &inner.api;
        let request_ref = &request;
        let submitted = retry(&inner.options.retry, is_retryable, move |attempt| {
            tracing::debug!(attempt, %project_id, "Submitting generation");
            api.submit_generation(request_ref)
        })
        .await
        .map_err(|e| exhausted(e, SUBMIT_RETRIES_EXHAUSTED))?;

        let generation_id = submitted.generation_id;
        tracing::info!(%generation_id, %project_id, "Generation submitted");

        inner.state.send_modify(|s| {
            s.generation_id = Some(generation_id.clone());
            s.status = Some(submitted.status);
            s.progress = submitted.status.progress_percent();
        });

        let events = inner.poller.start(&generation_id);
        let handle = tokio::spawn(Arc::clone(inner).listen(
            events,
            project_id,
            generation_id.clone(),
        ));
        *lock(&inner.listener) = Some(handle);

        Ok(generation_id)
    }

    /// Internal ref, then cached state, then the configured option; create
    /// a project when none is known.
    async fn resolve_project(&self) -> Result<DbId, ClientError> {
        let inner = &self.inner;
        let cached_ref = *lock(&inner.project_ref);
        let from_state = inner.state.borrow().project_id;
        let known = cached_ref.or(from_state).or(inner.options.project_id);
        if let Some(id) = known {
            *lock(&inner.project_ref) = Some(id);
            return Ok(id);
        }

        let project = NewProject {
            title: format!("Video Project - {}", chrono::Utc::now().to_rfc3339()),
            image_url: inner.options.image_url.clone(),
        };
        let api = &inner.api;
        let project_ref = &project;
        let created = retry(&inner.options.retry, is_retryable, move |attempt| {
            tracing::debug!(attempt, "Creating project");
            api.create_project(project_ref)
        })
        .await
        .map_err(|e| exhausted(e, PROJECT_RETRIES_EXHAUSTED))?;

        tracing::info!(project_id = %created.id, "Project created");
        *lock(&inner.project_ref) = Some(created.id);
        inner.state.send_modify(|s| s.project_id = Some(created.id));
        inner.cache.invalidate(&crate::cache::QueryKey::Projects);
        Ok(created.id)
    }
}

impl Inner {
    async fn listen(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<PollEvent>,
        project_id: DbId,
        generation_id: String,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                PollEvent::StatusUpdate(report) => self.on_status(&report),
                PollEvent::Completed(report) => {
                    self.on_terminal(report, project_id, &generation_id);
                }
                PollEvent::VideoReady(url) => {
                    self.state.send_modify(|s| s.video_url = Some(url));
                }
                PollEvent::Error(message) => {
                    self.state.send_modify(|s| {
                        s.is_generating = false;
                        s.error = Some(message.clone());
                    });
                    self.report_error(&ClientError::Polling(message));
                }
            }
        }
    }

    fn on_status(&self, report: &GenerationStatusReport) {
        let progress = report.status.progress_percent();
        self.state.send_modify(|s| {
            s.status = Some(report.status);
            s.progress = progress;
        });
        self.callbacks.on_progress(progress, report.status);
    }

    fn on_terminal(&self, report: GenerationStatusReport, project_id: DbId, generation_id: &str) {
        match report.status {
            GenerationStatus::Completed => {
                let video_url = report.video_url;
                self.state.send_modify(|s| {
                    s.video_url = video_url.clone();
                    s.progress = 100;
                });
                self.cache.invalidate_generation(Some(project_id), generation_id);
                if let Some(url) = &video_url {
                    self.callbacks.on_success(url);
                }
                self.callbacks
                    .toast(ToastLevel::Success, "Video generated successfully");
                self.callbacks.on_generation_complete();
                self.state.send_modify(|s| s.is_generating = false);
            }
            _ => {
                let message = report
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| GENERATION_FAILED_MESSAGE.to_string());
                tracing::warn!(generation_id, %message, "Generation failed");
                self.state.send_modify(|s| {
                    s.is_generating = false;
                    s.progress = 0;
                    s.error = Some(message.clone());
                });
                self.notify_error(&message, false);
            }
        }
    }

    fn report_error(&self, err: &ClientError) {
        let message = match err {
            ClientError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.notify_error(&message, err.is_insufficient_credits());
    }

    fn notify_error(&self, message: &str, insufficient_credits: bool) {
        self.callbacks.toast(ToastLevel::Error, message);
        if insufficient_credits {
            self.callbacks.on_insufficient_credits(message);
        } else {
            self.callbacks.on_error(message);
        }
    }

    fn stop_tracking(&self) {
        self.poller.stop();
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }
}

fn is_retryable(err: &ClientError) -> bool {
    !matches!(
        err,
        ClientError::InsufficientCredits(_) | ClientError::Validation(_) | ClientError::SessionExpired
    )
}

fn exhausted(err: ClientError, message: &str) -> ClientError {
    if is_retryable(&err) {
        tracing::warn!(error = %err, "{message}");
        ClientError::RetriesExhausted(message.to_string())
    } else {
        err
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
