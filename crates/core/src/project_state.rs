//! Project-level status derived from the statuses of its generations.

use serde::Serialize;

use crate::generation::GenerationStatus;
use crate::types::Timestamp;

/// Aggregate generation statuses into a single project status.
///
/// Precedence: no generations -> `queued`; any `generating` -> `generating`;
/// any `processing` -> `processing`; all `completed` -> `completed`; all
/// `failed` -> `failed`; anything else (including a mix of completed and
/// failed) -> `queued`.
pub fn aggregate_status(statuses: &[GenerationStatus]) -> GenerationStatus {
    use GenerationStatus::*;

    if statuses.is_empty() {
        return Queued;
    }
    if statuses.contains(&Generating) {
        return Generating;
    }
    if statuses.contains(&Processing) {
        return Processing;
    }
    if statuses.iter().all(|s| *s == Completed) {
        return Completed;
    }
    if statuses.iter().all(|s| *s == Failed) {
        return Failed;
    }
    Queued
}

/// Summary returned by `GET /projects/{id}/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectState {
    pub status: GenerationStatus,
    pub last_modified: Timestamp,
    pub generation_count: usize,
    pub completed_generations: usize,
    pub failed_generations: usize,
    /// Generations currently `generating` or `processing`.
    pub active_generations: usize,
}

impl ProjectState {
    pub fn from_statuses(statuses: &[GenerationStatus], last_modified: Timestamp) -> Self {
        let count = |wanted: GenerationStatus| statuses.iter().filter(|s| **s == wanted).count();

        Self {
            status: aggregate_status(statuses),
            last_modified,
            generation_count: statuses.len(),
            completed_generations: count(GenerationStatus::Completed),
            failed_generations: count(GenerationStatus::Failed),
            active_generations: statuses.iter().filter(|s| s.is_active()).count(),
        }
    }
}
