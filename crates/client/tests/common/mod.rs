#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;
use vidgen_client::api::{
    GenerationRequest, GenerationStatusReport, NewProject, ProjectRef, SubmittedGeneration,
    VideoApi,
};
use vidgen_client::orchestrator::{GenerationCallbacks, ToastLevel};
use vidgen_client::ClientError;
use vidgen_core::generation::GenerationStatus;

pub const VIDEO_URL: &str = "https://cdn.example.com/out.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Accept,
    InsufficientCredits,
    ServerError,
}

/// In-memory server: counts calls and replays status reports.
pub struct FakeApi {
    pub project_id: Uuid,
    pub project_failures: AtomicU32,
    pub create_calls: AtomicU32,
    pub submit_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub submit_mode: Mutex<SubmitMode>,
    pub last_request: Mutex<Option<GenerationRequest>>,
    statuses: Mutex<VecDeque<GenerationStatusReport>>,
}

impl FakeApi {
    pub fn new(statuses: Vec<GenerationStatusReport>) -> Arc<Self> {
        Arc::new(Self {
            project_id: Uuid::new_v4(),
            project_failures: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            submit_mode: Mutex::new(SubmitMode::Accept),
            last_request: Mutex::new(None),
            statuses: Mutex::new(statuses.into()),
        })
    }

    pub fn completing() -> Arc<Self> {
        Self::new(vec![
            report(GenerationStatus::Generating, None),
            report(GenerationStatus::Processing, None),
            report(GenerationStatus::Completed, Some(VIDEO_URL)),
        ])
    }

    pub fn failing_projects(self: &Arc<Self>, times: u32) {
        self.project_failures.store(times, Ordering::SeqCst);
    }

    pub fn set_submit_mode(&self, mode: SubmitMode) {
        *self.submit_mode.lock().unwrap() = mode;
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

pub fn report(status: GenerationStatus, url: Option<&str>) -> GenerationStatusReport {
    GenerationStatusReport {
        video_url: url.map(str::to_string),
        progress: Some(status.progress_percent()),
        ..GenerationStatusReport::new(status)
    }
}

#[async_trait]
impl VideoApi for FakeApi {
    async fn check_status(
        &self,
        _generation_id: &str,
    ) -> Result<GenerationStatusReport, ClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        next.ok_or_else(|| ClientError::InvalidResponse("no status scripted".into()))
    }

    async fn create_project(&self, _project: &NewProject) -> Result<ProjectRef, ClientError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.project_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.project_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::Http {
                status: 500,
                message: "database unavailable".into(),
            });
        }
        Ok(ProjectRef {
            id: self.project_id,
            title: None,
        })
    }

    async fn submit_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmittedGeneration, ClientError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match *self.submit_mode.lock().unwrap() {
            SubmitMode::Accept => Ok(SubmittedGeneration {
                generation_id: "gen-1".into(),
                status: GenerationStatus::Queued,
            }),
            SubmitMode::InsufficientCredits => Err(ClientError::InsufficientCredits(
                "Insufficient tokens: 0 available, 1 required".into(),
            )),
            SubmitMode::ServerError => Err(ClientError::Http {
                status: 502,
                message: "provider unavailable".into(),
            }),
        }
    }
}

/// Records every callback as a short string.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingCallbacks {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn has(&self, entry: &str) -> bool {
        self.calls().iter().any(|c| c == entry)
    }

    fn push(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

impl GenerationCallbacks for RecordingCallbacks {
    fn on_progress(&self, progress: u8, status: GenerationStatus) {
        self.push(format!("progress:{progress}:{status}"));
    }

    fn on_success(&self, video_url: &str) {
        self.push(format!("success:{video_url}"));
    }

    fn on_error(&self, message: &str) {
        self.push(format!("error:{message}"));
    }

    fn on_insufficient_credits(&self, message: &str) {
        self.push(format!("credits:{message}"));
    }

    fn on_generation_complete(&self) {
        self.push("complete".into());
    }

    fn toast(&self, level: ToastLevel, message: &str) {
        self.push(format!("toast:{level:?}:{message}"));
    }
}
