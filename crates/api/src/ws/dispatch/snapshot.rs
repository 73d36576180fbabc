//! TAKE_APP_SNAPSHOT and RECOVER_APP_SNAPSHOT.

use canopy_core::signal::{broadcast_types, error_codes, Broadcast, Feedback, InboundMessage};
use serde_json::json;

use super::payload_id;
use super::state::failure_message;
use crate::ws::hub::Hub;

impl Hub {
    pub(super) async fn handle_take_snapshot(&mut self, message: InboundMessage) {
        let Some(ctx) = self.edit_context(&message) else {
            return;
        };
        match self
            .services
            .snapshots
            .take_snapshot(ctx.team_id, ctx.app_id, ctx.user_id)
            .await
        {
            Ok(snapshot) => {
                let notice = Broadcast::new(broadcast_types::TAKE_SNAPSHOT, json!(snapshot)).into_remote();
                self.broadcast_to_other_clients(ctx.app_id, &message.client_id, &Feedback::broadcast(notice));
                self.send_to_client(&message.client_id, &Feedback::ok(json!(snapshot)));
            }
            Err(e) => self.send_to_client(
                &message.client_id,
                &Feedback::error(error_codes::TAKE_SNAPSHOT_FAILED, failure_message(&e)),
            ),
        }
    }

    pub(super) async fn handle_recover_snapshot(&mut self, message: InboundMessage) {
        let Some(ctx) = self.edit_context(&message) else {
            return;
        };
        let Some(snapshot_id) = payload_id(message.payload.first(), "snapshotID") else {
            self.send_to_client(
                &message.client_id,
                &Feedback::error(error_codes::RECOVER_SNAPSHOT_FAILED, "Payload requires a snapshotID"),
            );
            return;
        };

        match self
            .services
            .snapshots
            .recover(ctx.team_id, ctx.app_id, ctx.user_id, snapshot_id)
            .await
        {
            Ok(outcome) => {
                let data = json!(outcome);
                let notice = Broadcast::new(broadcast_types::RECOVER_SNAPSHOT, data.clone()).into_remote();
                self.broadcast_to_other_clients(ctx.app_id, &message.client_id, &Feedback::broadcast(notice));
                self.send_to_client(&message.client_id, &Feedback::ok(data));
            }
            Err(e) => self.send_to_client(
                &message.client_id,
                &Feedback::error(error_codes::RECOVER_SNAPSHOT_FAILED, failure_message(&e)),
            ),
        }
    }
}
