//! Handlers for `/teams/{teamID}/apps` and the public release read.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_core::app_config::AppConfig;
use canopy_core::error::CoreError;
use canopy_core::signal::{broadcast_types, Broadcast};
use canopy_core::types::{DbId, Version};
use canopy_db::models::app::{App, UpdateApp};
use canopy_state::app::AppExport;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::team::TeamEditor;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppRequest {
    #[validate(length(min = 1, max = 128))]
    pub app_name: String,
    pub config: Option<AppConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    /// Sets the app's public flag together with the release.
    pub public: Option<bool>,
}

/// POST /v1/teams/{teamID}/apps
pub async fn create(
    State(state): State<AppState>,
    editor: TeamEditor,
    Json(input): Json<CreateAppRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<App>>)> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let app = state
        .services
        .apps
        .create_app(editor.team_id, &input.app_name, input.config, editor.user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: app })))
}

/// GET /v1/teams/{teamID}/apps
pub async fn list(
    State(state): State<AppState>,
    editor: TeamEditor,
) -> AppResult<Json<DataResponse<Vec<App>>>> {
    let apps = state.services.apps.list(editor.team_id).await?;
    Ok(Json(DataResponse { data: apps }))
}

/// GET /v1/teams/{teamID}/apps/{appID}
pub async fn get_by_id(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<App>>> {
    let app = state.services.apps.get(editor.team_id, app_id).await?;
    Ok(Json(DataResponse { data: app }))
}

/// PUT /v1/teams/{teamID}/apps/{appID}
pub async fn update(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateApp>,
) -> AppResult<Json<DataResponse<App>>> {
    let app = state
        .services
        .apps
        .update(editor.team_id, app_id, &input, editor.user.user_id)
        .await?;
    Ok(Json(DataResponse { data: app }))
}

/// DELETE /v1/teams/{teamID}/apps/{appID}
pub async fn delete(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    if state.services.apps.delete(editor.team_id, app_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "app",
            id: app_id,
        }))
    }
}

/// GET /v1/teams/{teamID}/apps/{appID}/versions/{version}
///
/// `0` is the edit version, `-1` the mainline, `-2` the release.
pub async fn export(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, version)): Path<(DbId, DbId, Version)>,
) -> AppResult<Json<DataResponse<AppExport>>> {
    let export = state
        .services
        .apps
        .export(editor.team_id, app_id, version)
        .await?;
    Ok(Json(DataResponse { data: export }))
}

/// POST /v1/teams/{teamID}/apps/{appID}/deploy
pub async fn deploy(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
    body: Bytes,
) -> AppResult<Json<DataResponse<App>>> {
    let input: DeployRequest = if body.is_empty() {
        DeployRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let app = state
        .services
        .snapshots
        .release(editor.team_id, app_id, editor.user.user_id, input.public)
        .await?;

    let notice = Broadcast::new(broadcast_types::DEPLOY, serde_json::json!(app)).into_remote();
    if let Err(e) = state.hub.notify_room(app_id, notice) {
        tracing::warn!(app_id, error = %e, "Release not announced to editors");
    }
    Ok(Json(DataResponse { data: app }))
}

/// GET /v1/public/apps/{appID}
///
/// Released version of a public app. No authentication.
pub async fn public_release(
    State(state): State<AppState>,
    Path(app_id): Path<DbId>,
) -> AppResult<Json<DataResponse<AppExport>>> {
    let export = state.services.apps.export_public_release(app_id).await?;
    Ok(Json(DataResponse { data: export }))
}
