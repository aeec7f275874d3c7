//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the HTTP handlers,
//! the background generation tracker, and SSE subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::types::DbId;

// ---------------------------------------------------------------------------
// GenerationEvent
// ---------------------------------------------------------------------------

/// What happened to a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationEventKind {
    Created,
    StatusChanged,
    Completed,
    Failed,
}

/// A lifecycle event for one generation.
///
/// Constructed via [`GenerationEvent::new`] and enriched with
/// [`with_transition`](GenerationEvent::with_transition),
/// [`with_video_url`](GenerationEvent::with_video_url) and
/// [`with_error`](GenerationEvent::with_error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub kind: GenerationEventKind,
    pub generation_id: DbId,
    pub project_id: DbId,
    /// Owner of the generation; SSE streams filter on this.
    pub user_id: DbId,
    pub from_status: Option<GenerationStatus>,
    pub to_status: GenerationStatus,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationEvent {
    pub fn new(
        kind: GenerationEventKind,
        generation_id: DbId,
        project_id: DbId,
        user_id: DbId,
        status: GenerationStatus,
    ) -> Self {
        Self {
            kind,
            generation_id,
            project_id,
            user_id,
            from_status: None,
            to_status: status,
            video_url: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record the status the generation moved away from.
    ///
    /// Promotes `StatusChanged` to `Completed`/`Failed` when `to_status` is
    /// terminal.
    pub fn with_transition(mut self, from: GenerationStatus) -> Self {
        self.from_status = Some(from);
        if self.kind == GenerationEventKind::StatusChanged {
            self.kind = match self.to_status {
                GenerationStatus::Completed => GenerationEventKind::Completed,
                GenerationStatus::Failed => GenerationEventKind::Failed,
                _ => GenerationEventKind::StatusChanged,
            };
        }
        self
    }

    pub fn with_video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use uuid::Uuid;
/// use vidgen_core::generation::GenerationStatus;
/// use vidgen_events::{EventBus, GenerationEvent, GenerationEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(GenerationEvent::new(
///     GenerationEventKind::Created,
///     Uuid::new_v4(),
///     Uuid::new_v4(),
///     Uuid::new_v4(),
///     GenerationStatus::Queued,
/// ));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<GenerationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no active subscribers the event is dropped.
    pub fn publish(&self, event: GenerationEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn event(kind: GenerationEventKind, status: GenerationStatus) -> GenerationEvent {
        GenerationEvent::new(kind, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), status)
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sent = event(GenerationEventKind::Created, GenerationStatus::Queued);
        bus.publish(sent.clone());

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.generation_id, sent.generation_id);
        assert_eq!(e2.kind, GenerationEventKind::Created);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(event(GenerationEventKind::Created, GenerationStatus::Queued));
    }

    #[test]
    fn terminal_transition_promotes_kind() {
        let done = event(GenerationEventKind::StatusChanged, GenerationStatus::Completed)
            .with_transition(GenerationStatus::Processing)
            .with_video_url("https://cdn.example/v.mp4");
        assert_eq!(done.kind, GenerationEventKind::Completed);
        assert_eq!(done.from_status, Some(GenerationStatus::Processing));

        let failed = event(GenerationEventKind::StatusChanged, GenerationStatus::Failed)
            .with_transition(GenerationStatus::Generating)
            .with_error("boom");
        assert_eq!(failed.kind, GenerationEventKind::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let step = event(GenerationEventKind::StatusChanged, GenerationStatus::Generating)
            .with_transition(GenerationStatus::Preparing);
        assert_eq!(step.kind, GenerationEventKind::StatusChanged);
    }

    #[test]
    fn serializes_snake_case_kind() {
        let e = event(GenerationEventKind::StatusChanged, GenerationStatus::Processing);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "status_changed");
        assert_eq!(json["to_status"], "processing");
    }
}
