//! In-process event bus for generation lifecycle events.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`GenerationEvent`]: the event envelope, one per status change.

pub mod bus;

pub use bus::{EventBus, GenerationEvent, GenerationEventKind};
