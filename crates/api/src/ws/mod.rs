//! Realtime collaboration over WebSocket.
//!
//! Each connection runs a read pump and a write pump ([`client`]) and talks
//! to the single [`Hub`] task, which dispatches signals ([`dispatch`]) and
//! fans results out to the other clients of the same room.

pub mod client;
mod dispatch;
mod handler;
pub mod hub;

pub use handler::{binary_room, text_room};
pub use hub::{Hub, HubClosed, HubHandle, HubStats, DASHBOARD_ROOM_ID};
