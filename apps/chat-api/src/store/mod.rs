//! Storage collaborator contract for the realtime core.
//!
//! Persistence itself (schema, pooling, migrations) lives in the data
//! service; the realtime core only needs the narrow operations below.
//! Backed by the data service in production and an in-memory map in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub mod memory;

/// A conversation as seen by the realtime core.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participant_ids: Vec<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Message body kinds accepted on `send_message`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

/// Delivery status stamped on a message by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// A persisted chat message, shaped for the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

/// Fields for inserting a message; the store assigns id, timestamp, status.
#[derive(Debug)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
}

/// Persisted user availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Online,
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Operations the realtime core needs from the persistence layer.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch the conversation if `user_id` participates in it.
    ///
    /// `NotFound` when the conversation doesn't exist, `Forbidden` when the
    /// user is not a participant.
    async fn find_conversation_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation, StoreError>;

    async fn create_message(&self, new: NewMessage) -> Result<StoredMessage, StoreError>;

    async fn update_conversation_last_message_at(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Participant user ids for a conversation the requester belongs to.
    async fn list_participants(
        &self,
        conversation_id: &str,
        requester_id: &str,
    ) -> Result<Vec<String>, StoreError>;

    async fn mark_message_read(&self, message_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Mark every unread message in the conversation, except the caller's
    /// own, as read by the caller.
    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError>;

    async fn update_user_status(&self, user_id: &str, status: UserStatus)
        -> Result<(), StoreError>;

    async fn update_user_last_seen(&self, user_id: &str) -> Result<(), StoreError>;
}
