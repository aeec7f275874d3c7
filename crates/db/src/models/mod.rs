pub mod discovery;
pub mod generation;
pub mod payment;
pub mod project;
pub mod token;
