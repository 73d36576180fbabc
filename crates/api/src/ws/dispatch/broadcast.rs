//! BROADCAST_ONLY, GLOBAL_BROADCAST_ONLY, and binary relays.

use canopy_core::frame::BinaryFrame;
use canopy_core::signal::{error_codes, Feedback, InboundMessage, Signal};

use crate::ws::hub::{BinaryMessage, Hub};

impl Hub {
    pub(super) fn handle_broadcast_only(&mut self, message: InboundMessage) {
        match message.remote_feedback() {
            Some(feedback) => {
                self.broadcast_to_other_clients(message.app_id, &message.client_id, &feedback)
            }
            None => self.reject_missing_envelope(&message),
        }
    }

    pub(super) fn handle_global_broadcast_only(&mut self, message: InboundMessage) {
        match message.remote_feedback() {
            Some(feedback) => self.broadcast_to_global(Some(&message.client_id), &feedback),
            None => self.reject_missing_envelope(&message),
        }
    }

    fn reject_missing_envelope(&mut self, message: &InboundMessage) {
        self.send_to_client(
            &message.client_id,
            &Feedback::error(error_codes::INVALID_FRAME, "Broadcast signals need a broadcast envelope"),
        );
    }

    /// Relay a binary frame to peers. Only broadcast signals are accepted on
    /// the binary channel; anything else is dropped.
    pub(in crate::ws) fn handle_binary(&mut self, message: BinaryMessage) {
        if !self.binary_clients.contains_key(&message.client_id) {
            return;
        }
        let frame = match BinaryFrame::decode(&message.bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(client_id = %message.client_id, error = %e, "Dropping binary frame");
                return;
            }
        };
        if frame.is_global() {
            self.broadcast_binary_to_global(Some(&message.client_id), &message.bytes);
        } else if frame.signal == Signal::BroadcastOnly {
            self.broadcast_binary_to_other_clients(message.room_id, &message.client_id, &message.bytes);
        } else {
            tracing::debug!(client_id = %message.client_id, signal = ?frame.signal, "Binary frame signal not relayable");
        }
    }
}
