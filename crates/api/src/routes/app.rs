//! Route definitions for `/teams/{teamID}/apps`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{action, app, snapshot};
use crate::state::AppState;

/// Routes mounted at `/teams/{teamID}/apps`.
///
/// ```text
/// GET    /                                              -> list
/// POST   /                                              -> create
/// GET    /{appID}                                       -> get_by_id
/// PUT    /{appID}                                       -> update
/// DELETE /{appID}                                       -> delete
/// GET    /{appID}/versions/{version}                    -> export
/// POST   /{appID}/deploy                                -> deploy
///
/// POST   /{appID}/takeSnapshot                          -> snapshot::take
/// POST   /{appID}/recoverSnapshot/{snapshotID}          -> snapshot::recover
/// GET    /{appID}/snapshotList/limit/{limit}/page/{page} -> snapshot::list
/// GET    /{appID}/snapshots/{snapshotID}                -> snapshot::get_by_id
/// GET    /{appID}/editSnapshot                          -> snapshot::edit_snapshot
///
/// GET    /{appID}/actions                               -> action::list
/// POST   /{appID}/actions                               -> action::create
/// GET    /{appID}/actions/{actionID}                    -> action::get_by_id
/// PUT    /{appID}/actions/{actionID}                    -> action::update
/// DELETE /{appID}/actions/{actionID}                    -> action::delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(app::list).post(app::create))
        .route(
            "/{appID}",
            get(app::get_by_id).put(app::update).delete(app::delete),
        )
        .route("/{appID}/versions/{version}", get(app::export))
        .route("/{appID}/deploy", post(app::deploy))
        .route("/{appID}/takeSnapshot", post(snapshot::take))
        .route(
            "/{appID}/recoverSnapshot/{snapshotID}",
            post(snapshot::recover),
        )
        .route(
            "/{appID}/snapshotList/limit/{limit}/page/{page}",
            get(snapshot::list),
        )
        .route("/{appID}/snapshots/{snapshotID}", get(snapshot::get_by_id))
        .route("/{appID}/editSnapshot", get(snapshot::edit_snapshot))
        .route("/{appID}/actions", get(action::list).post(action::create))
        .route(
            "/{appID}/actions/{actionID}",
            get(action::get_by_id)
                .put(action::update)
                .delete(action::delete),
        )
}
