//! COOPERATE_ATTACH and COOPERATE_DISATTACH.

use canopy_core::signal::{error_codes, Feedback, InboundMessage, Signal};
use canopy_state::payload::display_name_from_payload;

use crate::ws::hub::Hub;

impl Hub {
    pub(super) fn handle_cooperate(&mut self, message: InboundMessage) {
        let Some((room_id, user_id)) = self.text_clients.get(&message.client_id).and_then(|c| {
            c.session.as_ref().map(|s| (c.room_id, s.user.id))
        }) else {
            return;
        };

        let names: Vec<String> = message
            .payload
            .iter()
            .filter_map(display_name_from_payload)
            .collect();
        if names.is_empty() {
            self.send_to_client(
                &message.client_id,
                &Feedback::error(error_codes::ATTACH_FAILED, "Payload names no components"),
            );
            return;
        }

        if message.signal == Signal::CooperateAttach {
            self.presence.attach_components(room_id, user_id, &names);
        } else {
            self.presence.disattach_components(room_id, user_id, &names);
        }
        self.broadcast_attachments(room_id);
    }
}
