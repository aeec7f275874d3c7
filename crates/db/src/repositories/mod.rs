//! Repository layer: one zero-sized struct per table, each method taking
//! the pool explicitly.

mod discovery_repo;
mod generation_repo;
mod payment_repo;
mod project_repo;
mod token_repo;

pub use discovery_repo::DiscoveryRepo;
pub use generation_repo::GenerationRepo;
pub use payment_repo::PaymentRepo;
pub use project_repo::ProjectRepo;
pub use token_repo::{TokenError, TokenRepo};
