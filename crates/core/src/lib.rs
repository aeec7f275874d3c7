//! Domain rules shared by the vidgen server and client crates.
//!
//! Nothing in here performs I/O except [`retry`], which sleeps between
//! attempts on the tokio timer.

pub mod error;
pub mod generation;
pub mod macros;
pub mod pagination;
pub mod payment;
pub mod polling;
pub mod project_state;
pub mod retry;
pub mod roles;
pub mod tokens;
pub mod types;
