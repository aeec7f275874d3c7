//! Background generation engine.
//!
//! [`tracker::GenerationTracker`] takes each accepted generation through the
//! video provider: submission, status polling, completion, and the token debit.

pub mod tracker;

pub use tracker::GenerationTracker;
