pub mod app;
pub mod health;
pub mod realtime;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/v1` route tree.
///
/// ```text
/// /teams/{teamID}/apps/...                         app, snapshot, action routes
/// /public/apps/{appID}                             released version of a public app
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/teams/{teamID}/apps", app::router())
        .route("/public/apps/{appID}", get(handlers::app::public_release))
}
