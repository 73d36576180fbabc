//! The realtime hub.
//!
//! One task owns every connection and the presence tables. Connections talk
//! to it only through a [`HubHandle`]; the run loop drains the handle's
//! channels and handles each event to completion before taking the next, so
//! the hub's processing order is the order every peer observes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use canopy_core::error::CoreError;
use canopy_core::presence::{PresenceTracker, UserPresence};
use canopy_core::signal::{broadcast_types, error_codes, Broadcast, Feedback, InboundMessage};
use canopy_core::types::DbId;
use canopy_state::StateServices;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::client::OutboundFrame;
use crate::echo::EchoGenerator;
use crate::trust::TrustService;

/// Room id of the dashboard, shared by every team member not inside an app.
pub const DASHBOARD_ROOM_ID: DbId = -1;

/// Which kind of room a connection joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    Dashboard,
    App,
}

impl RoomKind {
    /// Parse the `{kind}/{roomId}` pair of a websocket URL.
    pub fn from_path(kind: &str, room_id: DbId) -> Result<Self, CoreError> {
        match kind {
            "dashboard" if room_id == DASHBOARD_ROOM_ID => Ok(RoomKind::Dashboard),
            "dashboard" => Err(CoreError::Validation(format!(
                "Dashboard room id must be {DASHBOARD_ROOM_ID}"
            ))),
            "app" if room_id > 0 => Ok(RoomKind::App),
            "app" => Err(CoreError::Validation(format!("Invalid app id {room_id}"))),
            other => Err(CoreError::Validation(format!("Unknown room kind '{other}'"))),
        }
    }
}

/// JSON frames or raw binary frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Text,
    Binary,
}

/// Identity of a client that has entered its room.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserPresence,
    /// Team owning the app. `None` in the dashboard room.
    pub team_id: Option<DbId>,
}

/// One registered connection.
#[derive(Debug)]
pub struct Client {
    pub id: String,
    pub kind: RoomKind,
    pub room_id: DbId,
    sender: mpsc::Sender<OutboundFrame>,
    pub session: Option<Session>,
}

impl Client {
    /// Queue a frame without waiting. Returns `false` if the queue is full or
    /// the connection is gone.
    fn deliver(&self, frame: OutboundFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(client_id = %self.id, room_id = self.room_id, "Send queue full, evicting client");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Ask the write pump to send a close frame. A full queue is ignored;
    /// dropping the client closes the queue anyway.
    pub(super) fn close(&self) {
        let _ = self.sender.try_send(OutboundFrame::Close);
    }
}

/// A new connection announcing itself.
#[derive(Debug)]
pub struct Registration {
    pub client_id: String,
    pub kind: RoomKind,
    pub room_id: DbId,
    pub channel: Channel,
    pub sender: mpsc::Sender<OutboundFrame>,
}

/// A text frame from a read pump, parsed or not.
#[derive(Debug)]
pub enum TextEvent {
    Message(InboundMessage),
    Malformed { client_id: String, error: String },
}

impl TextEvent {
    pub fn parse(text: &str, client_id: &str, room_id: DbId) -> Self {
        match InboundMessage::parse(text, client_id, room_id) {
            Ok(message) => TextEvent::Message(message),
            Err(e) => TextEvent::Malformed {
                client_id: client_id.to_string(),
                error: e.to_string(),
            },
        }
    }
}

/// A binary frame from a read pump.
#[derive(Debug)]
pub struct BinaryMessage {
    pub client_id: String,
    pub room_id: DbId,
    pub bytes: Vec<u8>,
}

/// Who receives a [`Delivery`].
#[derive(Debug, Clone)]
pub enum Audience {
    /// Every text client in the room.
    Room(DbId),
    /// Every text client in the room except `origin`.
    Others { room_id: DbId, origin: String },
    /// Every text client in every room.
    Global,
    /// One text client.
    Client(String),
}

/// A feedback frame pushed into the hub from outside the run loop.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub audience: Audience,
    pub feedback: Feedback,
}

/// Connection and room counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HubStats {
    pub text_clients: usize,
    pub binary_clients: usize,
    pub rooms: usize,
}

/// Everything a connection reports, in the order it reported it.
///
/// Registration, frames and disconnect share one queue so the hub never sees
/// a connection's frame before its registration or after its unregistration.
#[derive(Debug)]
enum ConnectionEvent {
    Register(Registration),
    Text(TextEvent),
    Binary(BinaryMessage),
    Unregister(Channel, String),
}

/// Returned when the hub task is no longer running.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("Realtime hub is not running")]
pub struct HubClosed;

/// Cloneable handle for talking to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    connections: mpsc::UnboundedSender<ConnectionEvent>,
    broadcast: mpsc::UnboundedSender<Delivery>,
    stats: mpsc::UnboundedSender<oneshot::Sender<HubStats>>,
}

impl HubHandle {
    fn connection_event(&self, event: ConnectionEvent) -> Result<(), HubClosed> {
        self.connections.send(event).map_err(|_| HubClosed)
    }

    pub fn register(&self, registration: Registration) -> Result<(), HubClosed> {
        self.connection_event(ConnectionEvent::Register(registration))
    }

    /// Drop a connection once every frame it sent before has been handled.
    pub fn unregister(&self, channel: Channel, client_id: String) -> Result<(), HubClosed> {
        self.connection_event(ConnectionEvent::Unregister(channel, client_id))
    }

    pub fn broadcast(&self, delivery: Delivery) -> Result<(), HubClosed> {
        self.broadcast.send(delivery).map_err(|_| HubClosed)
    }

    pub fn on_text(&self, event: TextEvent) -> Result<(), HubClosed> {
        self.connection_event(ConnectionEvent::Text(event))
    }

    pub fn on_binary(&self, message: BinaryMessage) -> Result<(), HubClosed> {
        self.connection_event(ConnectionEvent::Binary(message))
    }

    /// Broadcast a server-originated event to every client of an app.
    pub fn notify_room(&self, room_id: DbId, broadcast: Broadcast) -> Result<(), HubClosed> {
        self.broadcast(Delivery {
            audience: Audience::Room(room_id),
            feedback: Feedback::broadcast(broadcast),
        })
    }

    pub async fn stats(&self) -> Result<HubStats, HubClosed> {
        let (reply, rx) = oneshot::channel();
        self.stats.send(reply).map_err(|_| HubClosed)?;
        rx.await.map_err(|_| HubClosed)
    }
}

struct HubReceivers {
    connections: mpsc::UnboundedReceiver<ConnectionEvent>,
    broadcast: mpsc::UnboundedReceiver<Delivery>,
    stats: mpsc::UnboundedReceiver<oneshot::Sender<HubStats>>,
}

/// The hub state. Owned by [`Hub::run`].
pub struct Hub {
    pub(super) text_clients: HashMap<String, Client>,
    pub(super) binary_clients: HashMap<String, Client>,
    pub(super) presence: PresenceTracker,
    pub(super) services: StateServices,
    pub(super) trust: Arc<dyn TrustService>,
    pub(super) echo: Option<Arc<dyn EchoGenerator>>,
    /// Handle given to work spawned off the loop so it can report back.
    pub(super) handle: HubHandle,
    /// Rooms whose presence changed through eviction or disconnect.
    stale_presence: BTreeSet<DbId>,
    rx: Option<HubReceivers>,
}

impl Hub {
    pub fn new(
        services: StateServices,
        trust: Arc<dyn TrustService>,
        echo: Option<Arc<dyn EchoGenerator>>,
    ) -> (Self, HubHandle) {
        let (connections_tx, connections) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast) = mpsc::unbounded_channel();
        let (stats_tx, stats) = mpsc::unbounded_channel();

        let handle = HubHandle {
            connections: connections_tx,
            broadcast: broadcast_tx,
            stats: stats_tx,
        };
        let hub = Self {
            text_clients: HashMap::new(),
            binary_clients: HashMap::new(),
            presence: PresenceTracker::new(),
            services,
            trust,
            echo,
            handle: handle.clone(),
            stale_presence: BTreeSet::new(),
            rx: Some(HubReceivers {
                connections,
                broadcast,
                stats,
            }),
        };
        (hub, handle)
    }

    /// Drain hub events until `cancel` fires.
    ///
    /// Connection events are taken ahead of server-side deliveries and are
    /// handled strictly in arrival order.
    pub async fn run(mut self, cancel: CancellationToken) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        tracing::info!("Realtime hub started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.close_all();
                    break;
                }
                Some(event) = rx.connections.recv() => match event {
                    ConnectionEvent::Register(registration) => self.register(registration),
                    ConnectionEvent::Text(event) => self.handle_text(event).await,
                    ConnectionEvent::Binary(message) => self.handle_binary(message),
                    ConnectionEvent::Unregister(channel, client_id) => {
                        self.unregister(channel, &client_id)
                    }
                },
                Some(delivery) = rx.broadcast.recv() => self.deliver(delivery),
                Some(reply) = rx.stats.recv() => {
                    let _ = reply.send(self.stats());
                }
            }
            self.flush_presence();
        }

        tracing::info!("Realtime hub stopped");
    }

    fn register(&mut self, registration: Registration) {
        let client = Client {
            id: registration.client_id.clone(),
            kind: registration.kind,
            room_id: registration.room_id,
            sender: registration.sender,
            session: None,
        };
        tracing::debug!(
            client_id = %client.id,
            room_id = client.room_id,
            channel = ?registration.channel,
            "Client registered"
        );
        match registration.channel {
            Channel::Text => self.text_clients.insert(registration.client_id, client),
            Channel::Binary => self.binary_clients.insert(registration.client_id, client),
        };
    }

    /// Drop a connection that went away. Unknown ids are ignored.
    fn unregister(&mut self, channel: Channel, client_id: &str) {
        if self.remove_client(channel, client_id).is_some() {
            tracing::debug!(client_id, ?channel, "Client unregistered");
        }
    }

    /// Remove a client and release its presence.
    ///
    /// Dropping the returned client closes its send queue, which stops its
    /// write pump.
    pub(super) fn remove_client(&mut self, channel: Channel, client_id: &str) -> Option<Client> {
        let client = match channel {
            Channel::Text => self.text_clients.remove(client_id),
            Channel::Binary => self.binary_clients.remove(client_id),
        }?;
        if let Some(session) = &client.session {
            if self.presence.leave_room(client.room_id, session.user.id) {
                self.stale_presence.insert(client.room_id);
            }
        }
        Some(client)
    }

    fn evict(&mut self, channel: Channel, client_ids: Vec<String>) {
        for client_id in client_ids {
            if self.remove_client(channel, &client_id).is_some() {
                tracing::info!(client_id = %client_id, ?channel, "Client evicted");
            }
        }
    }

    /// Broadcast a leave update to every room whose presence went stale.
    fn flush_presence(&mut self) {
        while let Some(room_id) = self.stale_presence.pop_first() {
            self.broadcast_presence(room_id, broadcast_types::LEAVE);
        }
    }

    /// Send the in-room user list (as `broadcast_type`) and the attachment
    /// map to everyone who has entered the room.
    pub(super) fn broadcast_presence(&mut self, room_id: DbId, broadcast_type: &str) {
        let users = self.presence.in_room_users(room_id);
        self.broadcast_to_room_members(
            room_id,
            &Feedback::broadcast(Broadcast::new(broadcast_type, json!(users))),
        );
        self.broadcast_attachments(room_id);
    }

    pub(super) fn broadcast_attachments(&mut self, room_id: DbId) {
        let attached = self.presence.attached_user_list(room_id);
        self.broadcast_to_room_members(
            room_id,
            &Feedback::broadcast(Broadcast::new(broadcast_types::ATTACH_COMPONENT, json!(attached))),
        );
    }

    fn close_all(&mut self) {
        let count = self.text_clients.len() + self.binary_clients.len();
        for client in self.text_clients.values().chain(self.binary_clients.values()) {
            client.close();
        }
        self.text_clients.clear();
        self.binary_clients.clear();
        tracing::info!(count, "Closed all realtime connections");
    }

    fn stats(&self) -> HubStats {
        HubStats {
            text_clients: self.text_clients.len(),
            binary_clients: self.binary_clients.len(),
            rooms: self.presence.room_count(),
        }
    }

    async fn handle_text(&mut self, event: TextEvent) {
        match event {
            TextEvent::Message(message) => self.dispatch(message).await,
            TextEvent::Malformed { client_id, error } => {
                tracing::debug!(client_id = %client_id, error = %error, "Malformed frame");
                self.send_to_client(
                    &client_id,
                    &Feedback::error(error_codes::INVALID_FRAME, format!("Malformed frame: {error}")),
                );
            }
        }
    }

    fn deliver(&mut self, delivery: Delivery) {
        let feedback = &delivery.feedback;
        match delivery.audience {
            Audience::Room(room_id) => self.broadcast_to_room_all_clients(room_id, feedback),
            Audience::Others { room_id, origin } => {
                self.broadcast_to_other_clients(room_id, &origin, feedback)
            }
            Audience::Global => self.broadcast_to_global(None, feedback),
            Audience::Client(client_id) => self.send_to_client(&client_id, feedback),
        }
    }

    // ---- fan-out ----

    /// Every text client in `room_id` except `origin`.
    pub(super) fn broadcast_to_other_clients(&mut self, room_id: DbId, origin: &str, feedback: &Feedback) {
        self.fan_out_text(feedback, |c| c.room_id == room_id && c.id != origin);
    }

    /// Every text client in `room_id`.
    pub(super) fn broadcast_to_room_all_clients(&mut self, room_id: DbId, feedback: &Feedback) {
        self.fan_out_text(feedback, |c| c.room_id == room_id);
    }

    /// Every text client in `room_id` that has entered.
    fn broadcast_to_room_members(&mut self, room_id: DbId, feedback: &Feedback) {
        self.fan_out_text(feedback, |c| c.room_id == room_id && c.session.is_some());
    }

    /// Every text client in every room, skipping `exclude` when given.
    pub(super) fn broadcast_to_global(&mut self, exclude: Option<&str>, feedback: &Feedback) {
        self.fan_out_text(feedback, |c| Some(c.id.as_str()) != exclude);
    }

    pub(super) fn send_to_client(&mut self, client_id: &str, feedback: &Feedback) {
        self.fan_out_text(feedback, |c| c.id == client_id);
    }

    pub(super) fn broadcast_binary_to_other_clients(&mut self, room_id: DbId, origin: &str, bytes: &[u8]) {
        self.fan_out_binary(bytes, |c| c.room_id == room_id && c.id != origin);
    }

    pub(super) fn broadcast_binary_to_global(&mut self, exclude: Option<&str>, bytes: &[u8]) {
        self.fan_out_binary(bytes, |c| Some(c.id.as_str()) != exclude);
    }

    fn fan_out_text(&mut self, feedback: &Feedback, include: impl Fn(&Client) -> bool) {
        let text = feedback.to_text();
        let dead: Vec<String> = self
            .text_clients
            .values()
            .filter(|c| include(c))
            .filter(|c| !c.deliver(OutboundFrame::Text(text.clone())))
            .map(|c| c.id.clone())
            .collect();
        self.evict(Channel::Text, dead);
    }

    fn fan_out_binary(&mut self, bytes: &[u8], include: impl Fn(&Client) -> bool) {
        let dead: Vec<String> = self
            .binary_clients
            .values()
            .filter(|c| include(c))
            .filter(|c| !c.deliver(OutboundFrame::Binary(bytes.to_vec())))
            .map(|c| c.id.clone())
            .collect();
        self.evict(Channel::Binary, dead);
    }
}
