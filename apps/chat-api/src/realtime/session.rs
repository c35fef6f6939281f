//! Per-connection session state.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::auth::Principal;

use super::fanout::Recipient;

/// State for a single authenticated WebSocket connection.
pub struct ConnectionSession {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    /// The authenticated identity for this connection.
    pub principal: Principal,
    /// Rooms this connection has joined.
    rooms: Mutex<HashSet<String>>,
}

impl ConnectionSession {
    pub fn new(principal: Principal) -> Self {
        Self {
            connection_id: murmur_common::id::prefixed_ulid(murmur_common::id::prefix::CONNECTION),
            principal,
            rooms: Mutex::new(HashSet::new()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }

    pub fn join_room(&self, room: &str) {
        self.rooms.lock().insert(room.to_string());
    }

    pub fn leave_room(&self, room: &str) {
        self.rooms.lock().remove(room);
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.lock().contains(room)
    }

    /// Whether this connection should receive an event with the given
    /// recipient selector.
    pub fn wants(&self, recipient: &Recipient) -> bool {
        match recipient {
            Recipient::Everyone => true,
            Recipient::Room(room) => self.in_room(room),
            Recipient::RoomExcept {
                room,
                connection_id,
            } => *connection_id != self.connection_id && self.in_room(room),
            Recipient::User(user_id) => *user_id == self.principal.user_id,
        }
    }
}
