#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use canopy_core::types::DbId;
use canopy_state::StateServices;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use canopy_api::config::{DeployMode, LogFormat, ServerConfig};
use canopy_api::router::build_app_router;
use canopy_api::state::AppState;
use canopy_api::trust::{TrustError, TrustService, UserProfile};
use canopy_api::ws::{Hub, HubHandle};

pub const TEAM_ID: DbId = 1;
/// A team member allowed to manage apps.
pub const EDITOR_ID: DbId = 7;
/// A second editor, for two-client scenarios.
pub const PEER_ID: DbId = 8;
/// A known user without the manage-apps permission.
pub const VIEWER_ID: DbId = 99;

/// Bearer token the fake trust service maps to `user_id`.
pub fn token_for(user_id: DbId) -> String {
    format!("token-{user_id}")
}

/// Trust service double. Tokens are `token-<userId>`; everyone may manage
/// apps except [`VIEWER_ID`].
pub struct FakeTrust;

#[async_trait]
impl TrustService for FakeTrust {
    async fn validate_token(&self, token: &str) -> Result<DbId, TrustError> {
        token
            .strip_prefix("token-")
            .and_then(|id| id.parse().ok())
            .ok_or(TrustError::InvalidToken)
    }

    async fn fetch_user(&self, user_id: DbId) -> Result<UserProfile, TrustError> {
        Ok(UserProfile {
            user_id,
            nickname: format!("user{user_id}"),
            avatar: String::new(),
            email: format!("user{user_id}@example.com"),
        })
    }

    async fn can_manage_apps(&self, team_id: DbId, user_id: DbId) -> Result<bool, TrustError> {
        Ok(team_id == TEAM_ID && user_id != VIEWER_ID)
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        deploy_mode: DeployMode::SelfHost,
        log_format: LogFormat::Pretty,
        database_url: String::new(),
        trust_service_url: "http://127.0.0.1:1".to_string(),
        trust_request_secret: String::new(),
        echo_endpoint: None,
    }
}

/// Spawn a hub over `pool` with the fake trust service.
///
/// The hub stops when the returned token is cancelled or the test runtime
/// shuts down.
pub fn spawn_hub(pool: &PgPool) -> (HubHandle, CancellationToken) {
    let (hub, handle) = Hub::new(StateServices::new(pool.clone()), Arc::new(FakeTrust), None);
    let cancel = CancellationToken::new();
    tokio::spawn(hub.run(cancel.clone()));
    (handle, cancel)
}

pub fn build_test_state(pool: PgPool) -> AppState {
    let (hub, _cancel) = spawn_hub(&pool);
    AppState {
        services: StateServices::new(pool.clone()),
        pool,
        config: Arc::new(test_config()),
        hub,
        trust: Arc::new(FakeTrust),
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(build_test_state(pool), &test_config())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    user_id: Option<DbId>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("Authorization", format!("Bearer {}", token_for(user_id)));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(EDITOR_ID), None).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(EDITOR_ID), Some(json)).await
}

pub async fn put_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(EDITOR_ID), Some(json)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(EDITOR_ID), None).await
}

/// Create an app over HTTP and return its id.
pub async fn create_app(pool: &PgPool, name: &str) -> DbId {
    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/v1/teams/{TEAM_ID}/apps"),
        serde_json::json!({"appName": name}),
    )
    .await;
    body_json(response).await["data"]["appId"].as_i64().unwrap()
}
