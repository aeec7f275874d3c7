//! Well-known role name constants.
//!
//! Carried in the `role` claim of access tokens issued by the auth provider.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
