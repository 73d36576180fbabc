//! Signal dispatch: one handler per signal, run inside the hub loop.
//!
//! Handlers reply to the sender through [`Hub::send_to_client`] and notify
//! peers through the hub's fan-out methods. They never touch the client maps
//! directly except to update the sender's own session.

mod broadcast;
mod enter;
mod presence;
mod snapshot;
mod state;
mod echo;

use canopy_core::signal::{error_codes, Feedback, InboundMessage, Signal};
use canopy_core::types::DbId;
use canopy_state::EditContext;
use serde_json::Value;

use super::hub::{Hub, RoomKind};

impl Hub {
    pub(in crate::ws) async fn dispatch(&mut self, message: InboundMessage) {
        let Some(client) = self.text_clients.get(&message.client_id) else {
            tracing::debug!(client_id = %message.client_id, "Frame from unknown client dropped");
            return;
        };
        if client.session.is_none() && !message.signal.allowed_before_enter() {
            self.send_to_client(
                &message.client_id,
                &Feedback::error(error_codes::LOGIN_FAILED, "Enter the room before sending signals"),
            );
            return;
        }

        tracing::trace!(client_id = %message.client_id, signal = ?message.signal, target = ?message.target, "Dispatching signal");
        match message.signal {
            Signal::Ping => {
                self.send_to_client(&message.client_id, &Feedback::ok(Value::String("pong".into())))
            }
            Signal::Enter => self.handle_enter(message).await,
            Signal::Leave => self.handle_leave(message),
            Signal::CreateState
            | Signal::DeleteState
            | Signal::UpdateState
            | Signal::MoveState
            | Signal::CreateOrUpdateState
            | Signal::PutState => self.handle_state_mutation(message).await,
            Signal::BroadcastOnly => self.handle_broadcast_only(message),
            Signal::GlobalBroadcastOnly => self.handle_global_broadcast_only(message),
            Signal::CooperateAttach | Signal::CooperateDisattach => self.handle_cooperate(message),
            Signal::TakeAppSnapshot => self.handle_take_snapshot(message).await,
            Signal::RecoverAppSnapshot => self.handle_recover_snapshot(message).await,
            Signal::Echo => self.handle_echo(message),
        }
    }

    /// The edit context of an entered client in an app room.
    ///
    /// Replies with an error and returns `None` for dashboard clients.
    fn edit_context(&mut self, message: &InboundMessage) -> Option<EditContext> {
        let context = self.text_clients.get(&message.client_id).and_then(|client| {
            let session = client.session.as_ref()?;
            match (client.kind, session.team_id) {
                (RoomKind::App, Some(team_id)) => {
                    Some(EditContext::new(team_id, client.room_id, session.user.id))
                }
                _ => None,
            }
        });
        if context.is_none() {
            self.send_to_client(
                &message.client_id,
                &Feedback::error(
                    message.signal.failure_code(),
                    "This signal is only accepted inside an app room",
                ),
            );
        }
        context
    }
}

/// Read an id from a payload element: a number, a numeric string, or an
/// object holding one under `field`.
fn payload_id(element: Option<&Value>, field: &str) -> Option<DbId> {
    match element? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => payload_id(map.get(field), field),
        _ => None,
    }
}
