//! Team-scoped authorization.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use canopy_core::error::CoreError;
use canopy_core::types::DbId;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// An authenticated user allowed to manage the apps of the `{teamID}` in the
/// request path. Rejects with 403 otherwise.
///
/// ```ignore
/// async fn handler(editor: TeamEditor) -> AppResult<Json<()>> {
///     tracing::info!(team_id = editor.team_id, user_id = editor.user.user_id, "editing");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TeamEditor {
    pub user: AuthUser,
    pub team_id: DbId,
}

impl FromRequestParts<AppState> for TeamEditor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let team_id = params
            .get("teamID")
            .and_then(|v| v.parse::<DbId>().ok())
            .ok_or_else(|| AppError::BadRequest("Missing or invalid teamID".into()))?;

        if !state.trust.can_manage_apps(team_id, user.user_id).await? {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Not allowed to manage apps of team {team_id}"
            ))));
        }
        Ok(TeamEditor { user, team_id })
    }
}
