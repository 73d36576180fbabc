//! Handlers for `/teams/{teamID}/apps/{appID}/actions`.
//!
//! Actions are edited over HTTP only. Editors announce changes to peers
//! themselves with an ACTION-target broadcast.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_core::error::CoreError;
use canopy_core::types::DbId;
use canopy_core::version::EDIT_VERSION;
use canopy_state::action::{ActionInput, ActionView};
use canopy_state::EditContext;

use crate::error::{AppError, AppResult};
use crate::middleware::team::TeamEditor;
use crate::response::DataResponse;
use crate::state::AppState;

fn edit_context(editor: &TeamEditor, app_id: DbId) -> EditContext {
    EditContext::new(editor.team_id, app_id, editor.user.user_id)
}

/// POST /v1/teams/{teamID}/apps/{appID}/actions
pub async fn create(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
    Json(input): Json<ActionInput>,
) -> AppResult<(StatusCode, Json<DataResponse<ActionView>>)> {
    state.services.apps.get(editor.team_id, app_id).await?;
    let action = state
        .services
        .actions
        .create(&edit_context(&editor, app_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: action })))
}

/// GET /v1/teams/{teamID}/apps/{appID}/actions
///
/// Actions of the edit version.
pub async fn list(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Vec<ActionView>>>> {
    state.services.apps.get(editor.team_id, app_id).await?;
    let actions = state.services.actions.list(app_id, EDIT_VERSION).await?;
    Ok(Json(DataResponse { data: actions }))
}

/// GET /v1/teams/{teamID}/apps/{appID}/actions/{actionID}
pub async fn get_by_id(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, action_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<Json<DataResponse<ActionView>>> {
    state.services.apps.get(editor.team_id, app_id).await?;
    let action = state.services.actions.get(app_id, action_id).await?;
    Ok(Json(DataResponse { data: action }))
}

/// PUT /v1/teams/{teamID}/apps/{appID}/actions/{actionID}
pub async fn update(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, action_id)): Path<(DbId, DbId, DbId)>,
    Json(input): Json<ActionInput>,
) -> AppResult<Json<DataResponse<ActionView>>> {
    state.services.apps.get(editor.team_id, app_id).await?;
    let action = state
        .services
        .actions
        .update(&edit_context(&editor, app_id), action_id, input)
        .await?;
    Ok(Json(DataResponse { data: action }))
}

/// DELETE /v1/teams/{teamID}/apps/{appID}/actions/{actionID}
pub async fn delete(
    State(state): State<AppState>,
    editor: TeamEditor,
    Path((_, app_id, action_id)): Path<(DbId, DbId, DbId)>,
) -> AppResult<StatusCode> {
    state.services.apps.get(editor.team_id, app_id).await?;
    if state
        .services
        .actions
        .delete(&edit_context(&editor, app_id), action_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "action",
            id: action_id,
        }))
    }
}
