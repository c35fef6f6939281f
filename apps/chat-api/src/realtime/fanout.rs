//! Broadcast hub for delivering events to connected clients.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connection
//! subscribes once and filters events locally against the recipient
//! selector. Delivery is best-effort: the persisted write is the durable
//! record, the live notification is not.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use super::presence::PresenceRegistry;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Room name for a conversation's broadcast group.
pub fn room_name(conversation_id: &str) -> String {
    format!("conversation:{conversation_id}")
}

/// Who an outbound event is addressed to.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// Every connected client.
    Everyone,
    /// Every connection currently joined to the room.
    Room(String),
    /// Every connection in the room except one (typing indicators).
    RoomExcept {
        room: String,
        connection_id: String,
    },
    /// Every connection belonging to one user.
    User(String),
}

/// A named event plus payload, in flight from the core to connections.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub recipient: Recipient,
    pub name: String,
    pub data: Value,
}

/// The global broadcast hub. Cloneable — store in AppState.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<OutboundEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the hub. Each connection should call this once.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OutboundEvent>> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all subscribed connections.
    pub fn dispatch(&self, recipient: Recipient, name: &str, data: Value) {
        // send() returns Err if there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(OutboundEvent {
            recipient,
            name: name.to_string(),
            data,
        }));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Fan-out entry points used by the session handlers.
#[derive(Clone)]
pub struct Notifier {
    bus: EventBus,
    presence: Arc<PresenceRegistry>,
}

impl Notifier {
    pub fn new(bus: EventBus, presence: Arc<PresenceRegistry>) -> Self {
        Self { bus, presence }
    }

    /// Deliver to every connected client, regardless of rooms.
    pub fn to_everyone(&self, name: &str, data: Value) {
        self.bus.dispatch(Recipient::Everyone, name, data);
    }

    /// Deliver to every connection joined to the conversation's room.
    pub fn to_room(&self, conversation_id: &str, name: &str, data: Value) {
        self.bus
            .dispatch(Recipient::Room(room_name(conversation_id)), name, data);
    }

    /// Deliver to the conversation's room, excluding one connection.
    pub fn to_room_except(
        &self,
        conversation_id: &str,
        connection_id: &str,
        name: &str,
        data: Value,
    ) {
        self.bus.dispatch(
            Recipient::RoomExcept {
                room: room_name(conversation_id),
                connection_id: connection_id.to_string(),
            },
            name,
            data,
        );
    }

    /// Deliver to every connection of `user_id`.
    ///
    /// Silently drops the event when the user has no live connections; an
    /// offline recipient is not an error.
    pub fn to_user(&self, user_id: &str, name: &str, data: Value) {
        if self.presence.connections_for(user_id).is_empty() {
            return;
        }
        self.bus
            .dispatch(Recipient::User(user_id.to_string()), name, data);
    }
}
