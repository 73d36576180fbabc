//! Per-room presence: who is connected and which components they focus.
//!
//! The tracker is owned by the hub loop and mutated only from there, so it
//! holds plain maps with no interior locking. A user may hold several
//! connections to the same room (two tabs); the user is only removed when the
//! last connection leaves.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::types::DbId;

/// A connected user as shown to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    pub id: DbId,
    pub nickname: String,
    pub avatar: String,
}

#[derive(Debug)]
struct RoomUser {
    presence: UserPresence,
    connections: usize,
    /// Reverse index of `Room::attached`, for cleanup on leave.
    attached_components: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Room {
    /// Connected users in arrival order.
    order: Vec<DbId>,
    users: HashMap<DbId, RoomUser>,
    /// Display name -> users focused on it, in attach order.
    attached: BTreeMap<String, Vec<DbId>>,
}

impl Room {
    fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn detach_all(&mut self, user_id: DbId) {
        let Some(user) = self.users.get_mut(&user_id) else {
            return;
        };
        let names = std::mem::take(&mut user.attached_components);
        for name in names {
            remove_attachment(&mut self.attached, &name, user_id);
        }
    }
}

fn remove_attachment(attached: &mut BTreeMap<String, Vec<DbId>>, name: &str, user_id: DbId) {
    if let Some(list) = attached.get_mut(name) {
        list.retain(|id| *id != user_id);
        if list.is_empty() {
            attached.remove(name);
        }
    }
}

/// Presence tables for every room.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    rooms: HashMap<DbId, Room>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for `user` to `room_id`.
    pub fn enter_room(&mut self, room_id: DbId, user: UserPresence) {
        let room = self.rooms.entry(room_id).or_default();
        match room.users.get_mut(&user.id) {
            Some(existing) => {
                existing.connections += 1;
                existing.presence = user;
            }
            None => {
                room.order.push(user.id);
                room.users.insert(
                    user.id,
                    RoomUser {
                        presence: user,
                        connections: 1,
                        attached_components: BTreeSet::new(),
                    },
                );
            }
        }
    }

    /// Drop one connection of `user_id` from `room_id`.
    ///
    /// When the user's last connection leaves, the user is removed from the
    /// room and from every attachment list. Returns `true` if the user was
    /// removed entirely. Unknown rooms and users are ignored.
    pub fn leave_room(&mut self, room_id: DbId, user_id: DbId) -> bool {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        let Some(user) = room.users.get_mut(&user_id) else {
            return false;
        };
        user.connections = user.connections.saturating_sub(1);
        if user.connections > 0 {
            return false;
        }

        room.detach_all(user_id);
        room.users.remove(&user_id);
        room.order.retain(|id| *id != user_id);
        if room.is_empty() {
            self.rooms.remove(&room_id);
        }
        true
    }

    /// Mark `user_id` as focused on each of `names`.
    ///
    /// Does nothing for users not in the room.
    pub fn attach_components(&mut self, room_id: DbId, user_id: DbId, names: &[String]) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(user) = room.users.get_mut(&user_id) else {
            return;
        };
        for name in names {
            if user.attached_components.insert(name.clone()) {
                room.attached.entry(name.clone()).or_default().push(user_id);
            }
        }
    }

    /// Remove the focus of `user_id` from each of `names`.
    pub fn disattach_components(&mut self, room_id: DbId, user_id: DbId, names: &[String]) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(user) = room.users.get_mut(&user_id) else {
            return;
        };
        for name in names {
            if user.attached_components.remove(name) {
                remove_attachment(&mut room.attached, name, user_id);
            }
        }
    }

    /// Users currently in the room, in arrival order.
    pub fn in_room_users(&self, room_id: DbId) -> Vec<UserPresence> {
        let Some(room) = self.rooms.get(&room_id) else {
            return Vec::new();
        };
        room.order
            .iter()
            .filter_map(|id| room.users.get(id))
            .map(|u| u.presence.clone())
            .collect()
    }

    /// Display name -> users focused on it.
    pub fn attached_user_list(&self, room_id: DbId) -> BTreeMap<String, Vec<UserPresence>> {
        let Some(room) = self.rooms.get(&room_id) else {
            return BTreeMap::new();
        };
        room.attached
            .iter()
            .map(|(name, ids)| {
                let users = ids
                    .iter()
                    .filter_map(|id| room.users.get(id))
                    .map(|u| u.presence.clone())
                    .collect();
                (name.clone(), users)
            })
            .collect()
    }

    /// Returns `true` if `user_id` appears anywhere in the room's tables.
    pub fn references_user(&self, room_id: DbId, user_id: DbId) -> bool {
        let Some(room) = self.rooms.get(&room_id) else {
            return false;
        };
        room.users.contains_key(&user_id)
            || room.order.contains(&user_id)
            || room.attached.values().any(|ids| ids.contains(&user_id))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: DbId) -> UserPresence {
        UserPresence {
            id,
            nickname: format!("user{id}"),
            avatar: String::new(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // enter / leave
    // -----------------------------------------------------------------------

    #[test]
    fn enter_lists_users_in_arrival_order() {
        let mut tracker = PresenceTracker::new();
        tracker.enter_room(42, user(2));
        tracker.enter_room(42, user(1));

        let ids: Vec<_> = tracker.in_room_users(42).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn leave_removes_every_reference() {
        let mut tracker = PresenceTracker::new();
        tracker.enter_room(42, user(1));
        tracker.enter_room(42, user(2));
        tracker.attach_components(42, 1, &names(&["btn1", "text1"]));
        tracker.attach_components(42, 2, &names(&["btn1"]));

        assert!(tracker.leave_room(42, 1));

        assert!(!tracker.references_user(42, 1));
        let attached = tracker.attached_user_list(42);
        assert_eq!(attached.len(), 1);
        assert_eq!(attached["btn1"], vec![user(2)]);
        assert!(!attached.contains_key("text1"));
    }

    #[test]
    fn second_connection_keeps_user_present() {
        let mut tracker = PresenceTracker::new();
        tracker.enter_room(42, user(1));
        tracker.enter_room(42, user(1));

        assert_eq!(tracker.in_room_users(42).len(), 1);
        assert!(!tracker.leave_room(42, 1));
        assert_eq!(tracker.in_room_users(42).len(), 1);
        assert!(tracker.leave_room(42, 1));
        assert!(tracker.in_room_users(42).is_empty());
        assert_eq!(tracker.room_count(), 0);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut tracker = PresenceTracker::new();
        assert!(!tracker.leave_room(7, 1));
        tracker.attach_components(7, 1, &names(&["btn1"]));
        tracker.disattach_components(7, 1, &names(&["btn1"]));
        tracker.enter_room(7, user(1));
        assert!(!tracker.leave_room(7, 99));
        assert_eq!(tracker.in_room_users(7).len(), 1);
    }

    // -----------------------------------------------------------------------
    // attach / disattach
    // -----------------------------------------------------------------------

    #[test]
    fn attach_is_idempotent() {
        let mut tracker = PresenceTracker::new();
        tracker.enter_room(1, user(1));
        tracker.attach_components(1, 1, &names(&["btn1"]));
        tracker.attach_components(1, 1, &names(&["btn1"]));
        assert_eq!(tracker.attached_user_list(1)["btn1"].len(), 1);
    }

    #[test]
    fn disattach_drops_empty_entries() {
        let mut tracker = PresenceTracker::new();
        tracker.enter_room(1, user(1));
        tracker.attach_components(1, 1, &names(&["btn1", "btn2"]));
        tracker.disattach_components(1, 1, &names(&["btn1"]));

        let attached = tracker.attached_user_list(1);
        assert!(!attached.contains_key("btn1"));
        assert_eq!(attached["btn2"], vec![user(1)]);
    }

    #[test]
    fn rooms_are_isolated() {
        let mut tracker = PresenceTracker::new();
        tracker.enter_room(1, user(1));
        tracker.enter_room(2, user(2));
        tracker.attach_components(1, 2, &names(&["btn1"]));

        assert!(tracker.attached_user_list(1).is_empty());
        assert_eq!(tracker.in_room_users(2), vec![user(2)]);
    }
}
