//! ENTER and LEAVE.

use canopy_core::app_config::EditedBy;
use canopy_core::presence::UserPresence;
use canopy_core::signal::{broadcast_types, error_codes, Feedback, InboundMessage};
use canopy_core::types::DbId;
use serde_json::{json, Value};

use crate::trust::TrustError;
use crate::ws::hub::{Channel, Hub, RoomKind, Session};

/// Read the auth token from an ENTER payload: a bare string or
/// `{authToken}`. A `Bearer ` prefix is accepted.
fn enter_token(payload: &[Value]) -> Option<&str> {
    let token = match payload.first()? {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("authToken").and_then(Value::as_str)?,
        _ => return None,
    };
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    (!token.is_empty()).then_some(token)
}

fn trust_feedback(err: &TrustError) -> Feedback {
    match err {
        TrustError::InvalidToken | TrustError::UnknownUser(_) => {
            Feedback::error(error_codes::LOGIN_FAILED, err.to_string())
        }
        TrustError::Unavailable(_) => {
            tracing::warn!(error = %err, "Trust service unavailable during enter");
            Feedback::error(error_codes::ENTER_FAILED, "Authentication is temporarily unavailable")
        }
    }
}

impl Hub {
    pub(super) async fn handle_enter(&mut self, message: InboundMessage) {
        let Some((kind, room_id)) = self
            .text_clients
            .get(&message.client_id)
            .map(|c| (c.kind, c.room_id))
        else {
            return;
        };

        let session = match self.authenticate(&message, kind, room_id).await {
            Ok(session) => session,
            Err(feedback) => {
                self.send_to_client(&message.client_id, &feedback);
                return;
            }
        };

        // A client that enters twice keeps a single presence entry.
        let previous = self
            .text_clients
            .get_mut(&message.client_id)
            .and_then(|client| client.session.replace(session.clone()));
        if let Some(previous) = previous {
            self.presence.leave_room(room_id, previous.user.id);
        }
        self.presence.enter_room(room_id, session.user.clone());

        tracing::info!(
            client_id = %message.client_id,
            room_id,
            user_id = session.user.id,
            "Client entered room"
        );
        self.send_to_client(&message.client_id, &Feedback::ok(json!(session.user)));
        self.broadcast_presence(room_id, broadcast_types::ENTER);
    }

    /// Resolve the ENTER token to a session, checking app permissions in app
    /// rooms. Failures come back as the feedback to send.
    async fn authenticate(
        &self,
        message: &InboundMessage,
        kind: RoomKind,
        room_id: DbId,
    ) -> Result<Session, Feedback> {
        let token = enter_token(&message.payload)
            .ok_or_else(|| Feedback::error(error_codes::LOGIN_FAILED, "Missing auth token"))?;
        let user_id = self
            .trust
            .validate_token(token)
            .await
            .map_err(|e| trust_feedback(&e))?;
        let profile = self
            .trust
            .fetch_user(user_id)
            .await
            .map_err(|e| trust_feedback(&e))?;
        let user = UserPresence {
            id: profile.user_id,
            nickname: profile.nickname.clone(),
            avatar: profile.avatar.clone(),
        };

        if kind == RoomKind::Dashboard {
            return Ok(Session { user, team_id: None });
        }

        let app = self.services.apps.get_by_app_id(room_id).await.map_err(|e| {
            tracing::debug!(room_id, error = %e, "Enter for unknown app");
            Feedback::error(error_codes::ENTER_FAILED, format!("App {room_id} is not available"))
        })?;
        let allowed = self
            .trust
            .can_manage_apps(app.team_id, user_id)
            .await
            .map_err(|e| trust_feedback(&e))?;
        if !allowed {
            return Err(Feedback::error(
                error_codes::FORBIDDEN,
                "You are not allowed to edit this app",
            ));
        }

        let editor = EditedBy {
            user_id,
            nickname: profile.nickname,
            avatar: profile.avatar,
            email: profile.email,
            edited_at: chrono::Utc::now(),
        };
        if let Err(e) = self.services.apps.add_editor(app.id, editor).await {
            tracing::warn!(app_id = app.id, user_id, error = %e, "Failed to record editor");
        }

        Ok(Session {
            user,
            team_id: Some(app.team_id),
        })
    }

    /// Close the sender's connection and release its presence.
    pub(super) fn handle_leave(&mut self, message: InboundMessage) {
        if let Some(client) = self.remove_client(Channel::Text, &message.client_id) {
            client.close();
            tracing::debug!(client_id = %client.id, room_id = client.room_id, "Client left");
        }
    }
}
