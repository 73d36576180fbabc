use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::ws::HubStats;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Connection counts, absent when the hub is down.
    pub realtime: Option<HubStats>,
    pub deploy_mode: &'static str,
    /// Whether signup requires an emailed verification code.
    pub verification_code_required: bool,
}

/// GET /health -- returns service, database, and hub health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = canopy_db::health_check(&state.pool).await.is_ok();
    let realtime = state.hub.stats().await.ok();

    let status = if db_healthy && realtime.is_some() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        realtime,
        deploy_mode: state.config.deploy_mode.as_str(),
        verification_code_required: state.config.deploy_mode.enforces_verification_code(),
    })
}

/// Mount health check routes (root level, not under `/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
