//! Authentication primitives.
//!
//! Tokens are issued by the hosted identity service; this server only
//! validates them.
//!
//! - [`jwt`] -- HS256 access-token validation (and generation, for tooling and tests).

pub mod jwt;
