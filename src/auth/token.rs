//! Token models returned by the token endpoint.

pub mod bundle;
pub mod secret;
