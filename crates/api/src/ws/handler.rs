use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use canopy_core::types::DbId;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::client::{read_pump, write_pump, Connection, MAX_MESSAGE_SIZE, SEND_BUFFER};
use crate::ws::hub::{Channel, HubHandle, Registration, RoomKind};

/// GET /room/{kind}/{roomId} -- JSON signal channel.
pub async fn text_room(
    ws: WebSocketUpgrade,
    Path((kind, room_id)): Path<(String, DbId)>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    upgrade(ws, &kind, room_id, Channel::Text, state.hub)
}

/// GET /room/{kind}/{roomId}/binary -- binary relay channel.
pub async fn binary_room(
    ws: WebSocketUpgrade,
    Path((kind, room_id)): Path<(String, DbId)>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    upgrade(ws, &kind, room_id, Channel::Binary, state.hub)
}

fn upgrade(
    ws: WebSocketUpgrade,
    kind: &str,
    room_id: DbId,
    channel: Channel,
    hub: HubHandle,
) -> AppResult<Response> {
    let kind = RoomKind::from_path(kind, room_id)?;
    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, hub, kind, room_id, channel))
        .into_response())
}

/// Run one connection: register with the hub, pump frames both ways, and
/// unregister when either side stops.
async fn handle_socket(
    socket: WebSocket,
    hub: HubHandle,
    kind: RoomKind,
    room_id: DbId,
    channel: Channel,
) {
    let conn = Connection {
        client_id: uuid::Uuid::new_v4().to_string(),
        room_id,
        channel,
    };
    let (tx, rx) = mpsc::channel(SEND_BUFFER);
    let registration = Registration {
        client_id: conn.client_id.clone(),
        kind,
        room_id,
        channel,
        sender: tx,
    };
    if hub.register(registration).is_err() {
        tracing::warn!("Realtime hub is not running, dropping connection");
        return;
    }
    tracing::info!(client_id = %conn.client_id, room_id, ?channel, "WebSocket connected");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_pump(sink, rx));

    tokio::select! {
        _ = read_pump(stream, &conn, &hub) => {}
        _ = &mut writer => {}
    }

    let _ = hub.unregister(channel, conn.client_id.clone());
    writer.abort();
    tracing::info!(client_id = %conn.client_id, "WebSocket disconnected");
}
