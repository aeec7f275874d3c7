//! Client side of the video generation lifecycle.
//!
//! - [`api::VideoApi`] / [`api::HttpVideoApi`]: the server endpoints the client uses.
//! - [`status::StatusEndpointClient`]: one status check, errors as values.
//! - [`polling::StatusPoller`]: repeated checks bounded by a [`PollBudget`](vidgen_core::polling::PollBudget).
//! - [`orchestrator::GenerationOrchestrator`]: prompt to finished video.
//! - [`cache::QueryCache`]: cached query results and their invalidation.
//! - [`session::SessionStore`]: tokens and idle detection.

pub mod api;
pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod polling;
pub mod session;
pub mod status;

pub use error::ClientError;
