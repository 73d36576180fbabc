//! Client for the trust service.
//!
//! Token validation, user profiles, and team permissions live in a separate
//! service. This server only asks it questions; it never issues tokens.

mod remote;
mod signing;

use async_trait::async_trait;
use canopy_core::types::DbId;
use serde::{Deserialize, Serialize};

pub use remote::RemoteTrustService;
pub use signing::{sign_request, REQUEST_TOKEN_HEADER};

#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// The token was rejected.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The user does not exist.
    #[error("User {0} not found")]
    UnknownUser(DbId),

    /// The trust service could not be reached or misbehaved.
    #[error("Trust service unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for TrustError {
    fn from(err: reqwest::Error) -> Self {
        TrustError::Unavailable(err.to_string())
    }
}

/// Profile fields shown to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "userID")]
    pub user_id: DbId,
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub email: String,
}

/// Questions this server asks the trust service.
#[async_trait]
pub trait TrustService: Send + Sync {
    /// Resolve a bearer token to a user id.
    async fn validate_token(&self, token: &str) -> Result<DbId, TrustError>;

    async fn fetch_user(&self, user_id: DbId) -> Result<UserProfile, TrustError>;

    /// Whether `user_id` may edit apps owned by `team_id`.
    async fn can_manage_apps(&self, team_id: DbId, user_id: DbId) -> Result<bool, TrustError>;
}
