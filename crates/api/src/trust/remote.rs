use std::time::Duration;

use async_trait::async_trait;
use canopy_core::types::DbId;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::signing::{sign_request, REQUEST_TOKEN_HEADER};
use super::{TrustError, TrustService, UserProfile};

/// HTTP request timeout for a single trust-service call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenValidation {
    #[serde(rename = "userID")]
    user_id: DbId,
}

#[derive(Deserialize)]
struct PermissionCheck {
    allowed: bool,
}

/// [`TrustService`] backed by the trust service's HTTP API.
pub struct RemoteTrustService {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl RemoteTrustService {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Result<Self, TrustError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<(StatusCode, Option<T>), TrustError> {
        let signature = sign_request(&self.secret, method.as_str(), path);
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(REQUEST_TOKEN_HEADER, signature);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok((status, Some(response.json().await?)));
        }
        if status.is_server_error() {
            return Err(TrustError::Unavailable(format!("trust service returned HTTP {status}")));
        }
        Ok((status, None))
    }
}

#[async_trait]
impl TrustService for RemoteTrustService {
    async fn validate_token(&self, token: &str) -> Result<DbId, TrustError> {
        let (_, body) = self
            .call::<TokenValidation>(Method::GET, "/v1/tokens/validate", Some(token))
            .await?;
        body.map(|v| v.user_id).ok_or(TrustError::InvalidToken)
    }

    async fn fetch_user(&self, user_id: DbId) -> Result<UserProfile, TrustError> {
        let (status, body) = self
            .call::<UserProfile>(Method::GET, &format!("/v1/users/{user_id}"), None)
            .await?;
        match body {
            Some(profile) => Ok(profile),
            None if status == StatusCode::NOT_FOUND => Err(TrustError::UnknownUser(user_id)),
            None => Err(TrustError::Unavailable(format!(
                "user lookup returned HTTP {status}"
            ))),
        }
    }

    async fn can_manage_apps(&self, team_id: DbId, user_id: DbId) -> Result<bool, TrustError> {
        let path = format!("/v1/teams/{team_id}/members/{user_id}/permissions/manageApps");
        let (_, body) = self.call::<PermissionCheck>(Method::GET, &path, None).await?;
        Ok(body.is_some_and(|check| check.allowed))
    }
}
