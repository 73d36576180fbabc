//! Handlers for app snapshots.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_core::error::CoreError;
use canopy_core::signal::{broadcast_types, Broadcast};
use canopy_core::types::DbId;
use canopy_db::models::app_snapshot::AppSnapshot;
use canopy_state::snapshot::{RecoverOutcome, SnapshotPage};

use crate::error::{AppError, AppResult};
use crate::middleware::team::TeamEditor;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /v1/teams/{teamID}/apps/{appID}/takeSnapshot
pub async fn take(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
) -> AppResult<(StatusCode, Json<DataResponse<AppSnapshot>>)> {
    let snapshot = state
        .services
        .snapshots
        .take_snapshot(editor.team_id, app_id, editor.user.user_id)
        .await?;

    let notice =
        Broadcast::new(broadcast_types::TAKE_SNAPSHOT, serde_json::json!(snapshot)).into_remote();
    if let Err(e) = state.hub.notify_room(app_id, notice) {
        tracing::warn!(app_id, error = %e, "Snapshot not announced to editors");
    }
    Ok((StatusCode::CREATED, Json(DataResponse { data: snapshot })))
}

/// POST /v1/teams/{teamID}/apps/{appID}/recoverSnapshot/{snapshotID}
pub async fn recover(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, snapshot_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<Json<DataResponse<RecoverOutcome>>> {
    let outcome = state
        .services
        .snapshots
        .recover(editor.team_id, app_id, editor.user.user_id, snapshot_id)
        .await?;

    let notice =
        Broadcast::new(broadcast_types::RECOVER_SNAPSHOT, serde_json::json!(outcome)).into_remote();
    if let Err(e) = state.hub.notify_room(app_id, notice) {
        tracing::warn!(app_id, error = %e, "Recover not announced to editors");
    }
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /v1/teams/{teamID}/apps/{appID}/snapshotList/limit/{limit}/page/{page}
pub async fn list(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, limit, page)): Path<(DbId, DbId, i64, i64)>,
) -> AppResult<Json<DataResponse<SnapshotPage>>> {
    let page = state
        .services
        .snapshots
        .list_snapshots(editor.team_id, app_id, Some(limit), page)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /v1/teams/{teamID}/apps/{appID}/snapshots/{snapshotID}
pub async fn get_by_id(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, snapshot_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<Json<DataResponse<AppSnapshot>>> {
    let snapshot = state
        .services
        .snapshots
        .get_snapshot(editor.team_id, app_id, snapshot_id)
        .await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /v1/teams/{teamID}/apps/{appID}/editSnapshot
///
/// The snapshot currently collecting realtime edits.
pub async fn edit_snapshot(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<AppSnapshot>>> {
    // Scopes the read to the caller's team.
    state.services.apps.get(editor.team_id, app_id).await?;
    let snapshot = state
        .services
        .snapshots
        .get_edit_snapshot(app_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "app_snapshot",
            id: app_id,
        }))?;
    Ok(Json(DataResponse { data: snapshot }))
}
