//! Tests for the realtime hub, driven through its handle without sockets.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use canopy_api::ws::client::OutboundFrame;
use canopy_api::ws::hub::{BinaryMessage, Channel, Registration, RoomKind, TextEvent};
use canopy_api::ws::{HubHandle, DASHBOARD_ROOM_ID};
use canopy_core::component::SUMMIT_DISPLAY_NAME;
use canopy_core::history::{AppModifyHistory, MAX_MODIFY_HISTORY};
use canopy_core::signal::{broadcast_types, error_codes};
use canopy_core::state_type::StateType;
use canopy_core::types::DbId;
use canopy_core::version::EDIT_VERSION;
use canopy_state::StateServices;
use common::{create_app, spawn_hub, token_for, EDITOR_ID, PEER_ID, VIEWER_ID};
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::sync::mpsc;

struct TestClient {
    id: String,
    room_id: DbId,
    rx: mpsc::Receiver<OutboundFrame>,
}

impl TestClient {
    fn connect(hub: &HubHandle, id: &str, kind: RoomKind, room_id: DbId, channel: Channel) -> Self {
        Self::connect_with_capacity(hub, id, kind, room_id, channel, 64)
    }

    fn connect_with_capacity(
        hub: &HubHandle,
        id: &str,
        kind: RoomKind,
        room_id: DbId,
        channel: Channel,
        capacity: usize,
    ) -> Self {
        let (sender, rx) = mpsc::channel(capacity);
        hub.register(Registration {
            client_id: id.to_string(),
            kind,
            room_id,
            channel,
            sender,
        })
        .unwrap();
        Self {
            id: id.to_string(),
            room_id,
            rx,
        }
    }

    fn send(&self, hub: &HubHandle, frame: Value) {
        hub.on_text(TextEvent::parse(&frame.to_string(), &self.id, self.room_id))
            .unwrap();
    }

    async fn next_frame(&mut self) -> OutboundFrame {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("client queue closed")
    }

    async fn next_json(&mut self) -> Value {
        match self.next_frame().await {
            OutboundFrame::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    /// Assert nothing arrives within a short grace period.
    async fn expect_silence(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(200), self.rx.recv()).await;
        assert!(result.is_err(), "unexpected frame: {result:?}");
    }

    /// Enter the room and consume the ok reply plus the presence broadcasts.
    async fn enter(&mut self, hub: &HubHandle, user_id: DbId) -> Value {
        self.send(hub, json!({"signal": 1, "payload": [{"authToken": token_for(user_id)}]}));
        let reply = self.next_json().await;
        if reply["errorCode"] == 0 {
            let enter = self.next_json().await;
            assert_eq!(enter["broadcast"]["type"], broadcast_types::ENTER);
            let attach = self.next_json().await;
            assert_eq!(attach["broadcast"]["type"], broadcast_types::ATTACH_COMPONENT);
        }
        reply
    }

    /// Consume the ENTER and ATTACH_COMPONENT broadcasts caused by a peer.
    async fn skip_presence(&mut self, broadcast_type: &str) -> Value {
        let presence = self.next_json().await;
        assert_eq!(presence["broadcast"]["type"], broadcast_type);
        let attach = self.next_json().await;
        assert_eq!(attach["broadcast"]["type"], broadcast_types::ATTACH_COMPONENT);
        presence
    }
}

fn button(name: &str) -> Value {
    json!({"displayName": name, "parentNode": SUMMIT_DISPLAY_NAME, "type": "BUTTON_WIDGET"})
}

fn user_ids(users: &Value) -> Vec<i64> {
    users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect()
}

async fn edit_history(pool: &PgPool, app_id: DbId) -> Vec<AppModifyHistory> {
    StateServices::new(pool.clone())
        .snapshots
        .get_edit_snapshot(app_id)
        .await
        .unwrap()
        .expect("edit snapshot")
        .modify_history
        .0
}

async fn component_names(pool: &PgPool, app_id: DbId) -> Vec<String> {
    StateServices::new(pool.clone())
        .tree
        .get_tree(app_id, EDIT_VERSION, StateType::Components)
        .await
        .unwrap()
        .unwrap()
        .children_node
        .iter()
        .map(|c| c.display_name.clone())
        .collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ping_before_enter_is_answered(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut client = TestClient::connect(&hub, "c1", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);

    client.send(&hub, json!({"signal": 0}));
    let reply = client.next_json().await;
    assert_eq!(reply["errorCode"], 0);
    assert_eq!(reply["data"], "pong");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_frames_are_rejected(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut client = TestClient::connect(&hub, "c1", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);

    hub.on_text(TextEvent::parse("{not json", "c1", DASHBOARD_ROOM_ID)).unwrap();
    assert_eq!(client.next_json().await["errorCode"], error_codes::INVALID_FRAME);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn mutations_before_enter_fail_login(pool: PgPool) {
    let app_id = create_app(&pool, "Gate").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut client = TestClient::connect(&hub, "c1", RoomKind::App, app_id, Channel::Text);

    client.send(&hub, json!({"signal": 3, "target": 1, "payload": [button("button1")]}));
    assert_eq!(client.next_json().await["errorCode"], error_codes::LOGIN_FAILED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enter_rejects_bad_token_and_missing_permission(pool: PgPool) {
    let app_id = create_app(&pool, "Locked").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut client = TestClient::connect(&hub, "c1", RoomKind::App, app_id, Channel::Text);

    client.send(&hub, json!({"signal": 1, "payload": ["not-a-token"]}));
    assert_eq!(client.next_json().await["errorCode"], error_codes::LOGIN_FAILED);

    let reply = client.enter(&hub, VIEWER_ID).await;
    assert_eq!(reply["errorCode"], error_codes::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enter_unknown_app_fails(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut client = TestClient::connect(&hub, "c1", RoomKind::App, 424242, Channel::Text);

    let reply = client.enter(&hub, EDITOR_ID).await;
    assert_eq!(reply["errorCode"], error_codes::ENTER_FAILED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dashboard_enter_shows_presence(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);

    let reply = a.enter(&hub, EDITOR_ID).await;
    assert_eq!(reply["data"]["id"], EDITOR_ID);
    // Presence is not shown to connections that have not entered.
    b.expect_silence().await;

    b.enter(&hub, PEER_ID).await;
    let presence = a.skip_presence(broadcast_types::ENTER).await;
    let ids: Vec<_> = presence["broadcast"]["payload"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![EDITOR_ID, PEER_ID]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_component_persists_and_reaches_peers(pool: PgPool) {
    let app_id = create_app(&pool, "Shared").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, app_id, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, app_id, Channel::Text);

    a.enter(&hub, EDITOR_ID).await;
    b.enter(&hub, PEER_ID).await;
    a.skip_presence(broadcast_types::ENTER).await;

    a.send(
        &hub,
        json!({
            "signal": 3,
            "target": 1,
            "payload": [button("button1")],
            "broadcast": {"type": "components/addComponentReducer", "payload": [button("button1")]}
        }),
    );

    let remote = b.next_json().await;
    assert_eq!(remote["errorCode"], error_codes::BROADCAST);
    assert_eq!(
        remote["broadcast"]["type"],
        "components/addComponentReducer/remote"
    );
    a.expect_silence().await;

    assert_eq!(component_names(&pool, app_id).await, vec!["button1"]);

    let history = edit_history(&pool, app_id).await;
    let latest = &history[0];
    assert_eq!(latest.operation, 3);
    assert_eq!(latest.operation_target, 1);
    assert_eq!(latest.operation_target_name, "button1");
    assert_eq!(latest.modified_by, EDITOR_ID);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn edit_sent_right_before_disconnect_is_applied(pool: PgPool) {
    let app_id = create_app(&pool, "LastWord").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, app_id, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, app_id, Channel::Text);

    a.enter(&hub, EDITOR_ID).await;
    b.enter(&hub, PEER_ID).await;
    a.skip_presence(broadcast_types::ENTER).await;

    a.send(
        &hub,
        json!({
            "signal": 3,
            "target": 1,
            "payload": [button("lastEdit")],
            "broadcast": {"type": "components/addComponentReducer", "payload": [button("lastEdit")]}
        }),
    );
    hub.unregister(Channel::Text, "a".into()).unwrap();

    let remote = b.next_json().await;
    assert_eq!(remote["broadcast"]["type"], "components/addComponentReducer/remote");
    let presence = b.skip_presence(broadcast_types::LEAVE).await;
    assert_eq!(user_ids(&presence["broadcast"]["payload"]), vec![PEER_ID]);

    assert_eq!(component_names(&pool, app_id).await, vec!["lastEdit"]);
    assert_eq!(hub.stats().await.unwrap().text_clients, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn attachments_are_shared_and_released_on_disconnect(pool: PgPool) {
    let app_id = create_app(&pool, "Cursor").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, app_id, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, app_id, Channel::Text);

    a.enter(&hub, EDITOR_ID).await;
    a.send(&hub, json!({"signal": 11, "target": 1, "payload": [{"displayName": "btn1"}]}));
    let attach = a.next_json().await;
    assert_eq!(attach["broadcast"]["type"], broadcast_types::ATTACH_COMPONENT);
    assert_eq!(user_ids(&attach["broadcast"]["payload"]["btn1"]), vec![EDITOR_ID]);

    b.send(&hub, json!({"signal": 1, "payload": [{"authToken": token_for(PEER_ID)}]}));
    assert_eq!(b.next_json().await["errorCode"], 0);
    let enter = b.next_json().await;
    assert_eq!(enter["broadcast"]["type"], broadcast_types::ENTER);
    assert_eq!(user_ids(&enter["broadcast"]["payload"]), vec![EDITOR_ID, PEER_ID]);
    let attach = b.next_json().await;
    assert_eq!(attach["broadcast"]["type"], broadcast_types::ATTACH_COMPONENT);
    assert_eq!(user_ids(&attach["broadcast"]["payload"]["btn1"]), vec![EDITOR_ID]);

    hub.unregister(Channel::Text, "a".into()).unwrap();

    let leave = b.next_json().await;
    assert_eq!(leave["broadcast"]["type"], broadcast_types::LEAVE);
    assert_eq!(user_ids(&leave["broadcast"]["payload"]), vec![PEER_ID]);
    let attach = b.next_json().await;
    assert_eq!(attach["broadcast"]["type"], broadcast_types::ATTACH_COMPONENT);
    assert_eq!(attach["broadcast"]["payload"], json!({}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn modify_history_keeps_the_ten_newest_signals(pool: PgPool) {
    let app_id = create_app(&pool, "Busy").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, app_id, Channel::Text);
    a.enter(&hub, EDITOR_ID).await;

    for n in 1..=15 {
        a.send(
            &hub,
            json!({"signal": 7, "target": 2, "payload": [{"key": format!("key{n}"), "value": n}]}),
        );
    }
    // Successful mutations are not acknowledged; the pong marks the end.
    a.send(&hub, json!({"signal": 0}));
    assert_eq!(a.next_json().await["data"], "pong");

    let history = edit_history(&pool, app_id).await;
    assert_eq!(history.len(), MAX_MODIFY_HISTORY);
    let names: Vec<_> = history
        .iter()
        .map(|h| h.operation_target_name.clone())
        .collect();
    let expected: Vec<_> = (6..=15).rev().map(|n| format!("key{n}")).collect();
    assert_eq!(names, expected);
    assert!(history.iter().all(|h| h.operation == 7 && h.operation_target == 2));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn peer_with_full_queue_is_evicted(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);
    // Room for exactly the three frames its own enter produces.
    let mut slow = TestClient::connect_with_capacity(
        &hub,
        "slow",
        RoomKind::Dashboard,
        DASHBOARD_ROOM_ID,
        Channel::Text,
        3,
    );

    slow.send(&hub, json!({"signal": 1, "payload": [{"authToken": token_for(PEER_ID)}]}));
    a.enter(&hub, EDITOR_ID).await;

    let presence = a.skip_presence(broadcast_types::LEAVE).await;
    assert_eq!(user_ids(&presence["broadcast"]["payload"]), vec![EDITOR_ID]);
    assert_eq!(hub.stats().await.unwrap().text_clients, 1);

    for _ in 0..3 {
        assert_matches!(slow.next_frame().await, OutboundFrame::Text(_));
    }
    let closed = tokio::time::timeout(Duration::from_secs(5), slow.rx.recv())
        .await
        .expect("evicted queue should close");
    assert!(closed.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_mutation_is_reported_only_to_sender(pool: PgPool) {
    let app_id = create_app(&pool, "Strict").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, app_id, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, app_id, Channel::Text);

    a.enter(&hub, EDITOR_ID).await;
    b.enter(&hub, PEER_ID).await;
    a.skip_presence(broadcast_types::ENTER).await;

    // Parent does not exist.
    a.send(
        &hub,
        json!({
            "signal": 3,
            "target": 1,
            "payload": [{"displayName": "orphan", "parentNode": "missing", "type": "BUTTON_WIDGET"}],
            "broadcast": {"type": "components/addComponentReducer", "payload": []}
        }),
    );

    assert_eq!(a.next_json().await["errorCode"], error_codes::CREATE_STATE_FAILED);
    b.expect_silence().await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn broadcast_only_skips_sender_and_other_rooms(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let first = create_app(&pool, "One").await;
    let second = create_app(&pool, "Two").await;
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, first, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, first, Channel::Text);
    let mut c = TestClient::connect(&hub, "c", RoomKind::App, second, Channel::Text);

    a.enter(&hub, EDITOR_ID).await;
    b.enter(&hub, PEER_ID).await;
    a.skip_presence(broadcast_types::ENTER).await;
    c.enter(&hub, PEER_ID).await;

    a.send(
        &hub,
        json!({"signal": 8, "target": 1, "broadcast": {"type": "components/updateComponentDisplayNameReducer", "payload": {"x": 1}}}),
    );

    let remote = b.next_json().await;
    assert_eq!(
        remote["broadcast"]["type"],
        "components/updateComponentDisplayNameReducer/remote"
    );
    assert_eq!(remote["broadcast"]["payload"]["x"], 1);
    a.expect_silence().await;
    c.expect_silence().await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn leave_closes_connection_and_updates_peers(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::Dashboard, DASHBOARD_ROOM_ID, Channel::Text);

    a.enter(&hub, EDITOR_ID).await;
    b.enter(&hub, PEER_ID).await;
    a.skip_presence(broadcast_types::ENTER).await;

    b.send(&hub, json!({"signal": 2}));
    assert_eq!(b.next_frame().await, OutboundFrame::Close);

    let presence = a.skip_presence(broadcast_types::LEAVE).await;
    assert_eq!(presence["broadcast"]["payload"].as_array().unwrap().len(), 1);
    assert_eq!(hub.stats().await.unwrap().text_clients, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn binary_frames_relay_to_room_peers(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, 5, Channel::Binary);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, 5, Channel::Binary);
    let mut c = TestClient::connect(&hub, "c", RoomKind::App, 6, Channel::Binary);

    let bytes = vec![8u8, 3, 0x01, 0x02];
    hub.on_binary(BinaryMessage {
        client_id: "a".into(),
        room_id: 5,
        bytes: bytes.clone(),
    })
    .unwrap();

    assert_eq!(b.next_frame().await, OutboundFrame::Binary(bytes));
    a.expect_silence().await;
    c.expect_silence().await;

    // Mutation signals are never relayed on the binary channel.
    hub.on_binary(BinaryMessage {
        client_id: "a".into(),
        room_id: 5,
        bytes: vec![3u8, 1, 0x00],
    })
    .unwrap();
    b.expect_silence().await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn room_notifications_reach_every_client(pool: PgPool) {
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, 9, Channel::Text);
    let mut b = TestClient::connect(&hub, "b", RoomKind::App, 9, Channel::Text);

    hub.notify_room(
        9,
        canopy_core::signal::Broadcast::new(broadcast_types::DEPLOY, json!({"appId": 9})).into_remote(),
    )
    .unwrap();

    for client in [&mut a, &mut b] {
        let frame = client.next_json().await;
        assert_eq!(frame["broadcast"]["type"], "appInfo/deploy/remote");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn kv_update_with_row_id_can_rename_the_key(pool: PgPool) {
    let app_id = create_app(&pool, "Rename").await;
    let (hub, _cancel) = spawn_hub(&pool);
    let mut a = TestClient::connect(&hub, "a", RoomKind::App, app_id, Channel::Text);
    a.enter(&hub, EDITOR_ID).await;

    a.send(&hub, json!({"signal": 3, "target": 2, "payload": [{"key": "input1", "value": "a"}]}));
    a.send(&hub, json!({"signal": 0}));
    assert_eq!(a.next_json().await["data"], "pong");

    let kv = StateServices::new(pool.clone()).kv;
    let created = kv
        .get_by_key(app_id, StateType::Dependencies, EDIT_VERSION, "input1")
        .await
        .unwrap()
        .unwrap();

    a.send(
        &hub,
        json!({"signal": 5, "target": 2, "payload": [{"id": created.id, "key": "input2", "value": "b"}]}),
    );
    a.send(&hub, json!({"signal": 0}));
    assert_eq!(a.next_json().await["data"], "pong");

    let renamed = kv
        .get_by_key(app_id, StateType::Dependencies, EDIT_VERSION, "input2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.id, created.id);
    assert_eq!(renamed.value, "b");
}
