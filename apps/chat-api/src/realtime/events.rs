//! Wire-format events exchanged with clients.
//!
//! Both directions use an `{ "event": name, "data": payload }` envelope.
//! Payload keys are camelCase; this shape is the compatibility surface and
//! must not drift.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::MessageKind;

// ---------------------------------------------------------------------------
// Client → Server requests
// ---------------------------------------------------------------------------

/// A request received from the client, tagged by event name.
///
/// A closed enum rather than a string-keyed handler map: the dispatcher
/// match is checked for exhaustiveness at compile time.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConversation(ConversationRef),
    LeaveConversation(ConversationRef),
    SendMessage(SendMessagePayload),
    TypingStart(ConversationRef),
    TypingStop(ConversationRef),
    MarkAsRead(MarkAsReadPayload),
    MarkConversationAsRead(ConversationRef),
}

impl ClientEvent {
    /// Event name used for the reply envelope.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => "join_conversation",
            Self::LeaveConversation(_) => "leave_conversation",
            Self::SendMessage(_) => "send_message",
            Self::TypingStart(_) => "typing_start",
            Self::TypingStop(_) => "typing_stop",
            Self::MarkAsRead(_) => "mark_as_read",
            Self::MarkConversationAsRead(_) => "mark_conversation_as_read",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub conversation_id: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    pub conversation_id: String,
    pub message_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Server → Client envelope
// ---------------------------------------------------------------------------

/// An event sent from the server to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub event: String,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Dispatch event names
// ---------------------------------------------------------------------------

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const CONNECTED: &'static str = "connected";
    pub const USER_STATUS: &'static str = "user_status";
    pub const NEW_MESSAGE: &'static str = "new_message";
    pub const CONVERSATION_UPDATED: &'static str = "conversation_updated";
    pub const USER_TYPING: &'static str = "user_typing";
    pub const MESSAGES_READ: &'static str = "messages_read";
    pub const ERROR: &'static str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_conversation_parses() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "join_conversation", "data": {"conversationId": "c1"}}"#,
        )
        .expect("parse");
        assert_eq!(event.name(), "join_conversation");
        match event {
            ClientEvent::JoinConversation(payload) => assert_eq!(payload.conversation_id, "c1"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn send_message_defaults_to_text() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "send_message", "data": {"conversationId": "c1", "content": "hi"}}"#,
        )
        .expect("parse");
        match event {
            ClientEvent::SendMessage(payload) => {
                assert_eq!(payload.content, "hi");
                assert_eq!(payload.kind, MessageKind::Text);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn send_message_accepts_explicit_type() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "send_message", "data": {"conversationId": "c1", "content": "x", "type": "image"}}"#,
        )
        .expect("parse");
        match event {
            ClientEvent::SendMessage(payload) => assert_eq!(payload.kind, MessageKind::Image),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mark_as_read_carries_message_ids() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "mark_as_read", "data": {"conversationId": "c1", "messageIds": ["m1", "m2"]}}"#,
        )
        .expect("parse");
        match event {
            ClientEvent::MarkAsRead(payload) => {
                assert_eq!(payload.message_ids, vec!["m1", "m2"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event": "self_destruct", "data": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_payload_field_is_rejected() {
        let result =
            serde_json::from_str::<ClientEvent>(r#"{"event": "send_message", "data": {"content": "hi"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_event_envelope_shape() {
        let event = ServerEvent::new(EventName::USER_STATUS, json!({"userId": "u1"}));
        let value: Value = serde_json::from_str(&event.to_json()).expect("round trip");
        assert_eq!(value["event"], "user_status");
        assert_eq!(value["data"]["userId"], "u1");
    }
}
