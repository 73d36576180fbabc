//! WebSocket routes, mounted at root level.

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// ```text
/// GET /room/{kind}/{roomId}           -> JSON signal channel
/// GET /room/{kind}/{roomId}/binary    -> binary relay channel
/// ```
///
/// `kind` is `app` (with an app id) or `dashboard` (with room id `-1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/room/{kind}/{roomId}", get(ws::text_room))
        .route("/room/{kind}/{roomId}/binary", get(ws::binary_room))
}
