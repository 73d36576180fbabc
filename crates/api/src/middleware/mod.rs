//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Resolves the Bearer token through the trust service.
//! - [`team::TeamEditor`] -- Additionally requires permission to manage the
//!   team's apps.

pub mod auth;
pub mod team;
