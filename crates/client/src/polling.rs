//! Repeated status checks for one generation at a time.
//!
//! A [`StatusPoller`] owns at most one polling session. Each session is a
//! single task that checks immediately, then once per interval, until the
//! generation is terminal, the [`PollBudget`] runs out, or the session is
//! cancelled. Events go out on an unbounded mpsc channel returned by
//! [`StatusPoller::start`].

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::polling::{BudgetExhausted, PollBudget};

use crate::api::GenerationStatusReport;
use crate::status::StatusEndpointClient;

/// Recorded when a check produced neither data nor an error message.
pub const NO_DATA_MESSAGE: &str = "No data returned from status check";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed,
    TimedOut,
    MaxAttemptsExceeded,
    Stopped,
}

impl PollState {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Idle | Self::Polling)
    }
}

impl From<BudgetExhausted> for PollState {
    fn from(reason: BudgetExhausted) -> Self {
        match reason {
            BudgetExhausted::MaxAttempts(_) => Self::MaxAttemptsExceeded,
            BudgetExhausted::Timeout(_) => Self::TimedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// Every successful check.
    StatusUpdate(GenerationStatusReport),
    /// The generation reached `completed` or `failed`.
    Completed(GenerationStatusReport),
    /// Follows `Completed` when the report carries a video URL.
    VideoReady(String),
    /// Polling gave up. Sent at most once per session.
    Error(String),
}

#[derive(Debug)]
struct PollerShared {
    state: PollState,
    attempts: u32,
    last_error: Option<String>,
    generation_id: Option<String>,
    /// Bumped on every start/stop so a superseded task cannot write.
    session_id: u64,
}

struct ActiveSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct StatusPoller {
    client: StatusEndpointClient,
    budget: PollBudget,
    shared: Arc<Mutex<PollerShared>>,
    session: Mutex<Option<ActiveSession>>,
}

impl StatusPoller {
    pub fn new(client: StatusEndpointClient, budget: PollBudget) -> Self {
        Self {
            client,
            budget,
            shared: Arc::new(Mutex::new(PollerShared {
                state: PollState::Idle,
                attempts: 0,
                last_error: None,
                generation_id: None,
                session_id: 0,
            })),
            session: Mutex::new(None),
        }
    }

    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Begin polling `generation_id`, replacing any running session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, generation_id: &str) -> mpsc::UnboundedReceiver<PollEvent> {
        self.cancel_session();

        let session_id = {
            let mut shared = lock(&self.shared);
            shared.session_id += 1;
            shared.state = PollState::Polling;
            shared.attempts = 0;
            shared.last_error = None;
            shared.generation_id = Some(generation_id.to_string());
            shared.session_id
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = PollTask {
            client: self.client.clone(),
            budget: self.budget,
            shared: Arc::clone(&self.shared),
            session_id,
            generation_id: generation_id.to_string(),
            cancel: cancel.clone(),
            events: tx,
        };
        let handle = tokio::spawn(task.run());

        tracing::debug!(generation_id, session_id, "Polling started");
        *lock(&self.session) = Some(ActiveSession { cancel, handle });
        rx
    }

    /// Cancel the running session, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        self.cancel_session();

        let mut shared = lock(&self.shared);
        shared.session_id += 1;
        shared.attempts = 0;
        if shared.state == PollState::Polling {
            shared.state = PollState::Stopped;
        }
    }

    /// One check outside any session. Errors are recorded, not returned.
    pub async fn check_status_once(&self, generation_id: &str) -> Option<GenerationStatusReport> {
        match self.client.check_status(generation_id).await {
            Ok(report) => Some(report),
            Err(e) => {
                let message = e.to_string();
                lock(&self.shared).last_error = Some(if message.is_empty() {
                    NO_DATA_MESSAGE.to_string()
                } else {
                    message
                });
                None
            }
        }
    }

    pub fn state(&self) -> PollState {
        lock(&self.shared).state
    }

    pub fn attempts(&self) -> u32 {
        lock(&self.shared).attempts
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared).last_error.clone()
    }

    pub fn generation_id(&self) -> Option<String> {
        lock(&self.shared).generation_id.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    fn cancel_session(&self) {
        if let Some(session) = lock(&self.session).take() {
            session.cancel.cancel();
            // The task only exits at await points; aborting covers a check
            // that ignores cancellation.
            session.handle.abort();
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel_session();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

struct PollTask {
    client: StatusEndpointClient,
    budget: PollBudget,
    shared: Arc<Mutex<PollerShared>>,
    session_id: u64,
    generation_id: String,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PollEvent>,
}

impl PollTask {
    async fn run(self) {
        let started = Instant::now();
        let deadline = started + self.budget.timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if let Err(reason) = self.budget.admit(attempt, started.elapsed()) {
                self.exhaust(reason);
                return;
            }
            if !self.update(|shared| shared.attempts = attempt) {
                return;
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                // A hung check still ends at the deadline; the next admit
                // reports the timeout.
                _ = tokio::time::sleep_until(deadline) => continue,
                result = self.client.check_status(&self.generation_id) => result,
            };

            match result {
                Ok(report) => {
                    if self.handle_report(report) {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        generation_id = %self.generation_id,
                        attempt,
                        error = %e,
                        "Status check failed, will retry",
                    );
                    let message = e.to_string();
                    self.update(|shared| shared.last_error = Some(message));
                }
            }

            let next = std::cmp::min(Instant::now() + self.budget.interval, deadline);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(next) => {}
            }
        }
    }

    /// Emit events for one report. Returns true when polling should end.
    fn handle_report(&self, report: GenerationStatusReport) -> bool {
        if !self.is_current() {
            return true;
        }
        let _ = self.events.send(PollEvent::StatusUpdate(report.clone()));

        if !report.status.is_terminal() {
            return false;
        }

        let state = match report.status {
            GenerationStatus::Completed => PollState::Completed,
            _ => PollState::Failed,
        };
        if !self.update(|shared| shared.state = state) {
            return true;
        }

        tracing::info!(
            generation_id = %self.generation_id,
            status = %report.status,
            "Generation reached terminal status",
        );
        let video_url = report.video_url.clone();
        let _ = self.events.send(PollEvent::Completed(report));
        if let Some(url) = video_url {
            let _ = self.events.send(PollEvent::VideoReady(url));
        }
        true
    }

    fn exhaust(&self, reason: BudgetExhausted) {
        let message = reason.to_string();
        let recorded = self.update(|shared| {
            shared.state = PollState::from(reason);
            shared.last_error = Some(message.clone());
        });
        if recorded {
            tracing::warn!(generation_id = %self.generation_id, %message, "Polling stopped");
            let _ = self.events.send(PollEvent::Error(message));
        }
    }

    fn is_current(&self) -> bool {
        lock(&self.shared).session_id == self.session_id
    }

    /// Apply `f` only while this task's session is still the current one.
    fn update(&self, f: impl FnOnce(&mut PollerShared)) -> bool {
        let mut shared = lock(&self.shared);
        if shared.session_id != self.session_id {
            return false;
        }
        f(&mut shared);
        true
    }
}
