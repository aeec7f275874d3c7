//! Request handlers, one module per resource.
//!
//! Handlers delegate persistence to the repositories in `vidgen_db` and map
//! errors via [`AppError`](crate::error::AppError).

pub mod discovery;
pub mod payment;
pub mod project;
pub mod video;
