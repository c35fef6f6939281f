//! In-memory implementation of the storage contract (for dev and tests).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::StoreError;

use super::{
    Conversation, ConversationStore, MessageStatus, NewMessage, StoredMessage, UserStatus,
};

struct ConversationRecord {
    participant_ids: Vec<String>,
    last_message_at: Option<DateTime<Utc>>,
}

struct MessageRecord {
    message: StoredMessage,
    read_by: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, ConversationRecord>,
    messages: HashMap<String, MessageRecord>,
    user_status: HashMap<String, UserStatus>,
    user_last_seen: HashMap<String, DateTime<Utc>>,
}

/// In-memory store. Stands in for the data service until it is wired in,
/// and backs the test suites.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a conversation with the given participants.
    pub fn seed_conversation(&self, conversation_id: &str, participant_ids: &[&str]) {
        self.inner.lock().conversations.insert(
            conversation_id.to_string(),
            ConversationRecord {
                participant_ids: participant_ids.iter().map(|s| s.to_string()).collect(),
                last_message_at: None,
            },
        );
    }

    /// Messages persisted for a conversation, oldest first.
    pub fn messages_in(&self, conversation_id: &str) -> Vec<StoredMessage> {
        let inner = self.inner.lock();
        let mut messages: Vec<StoredMessage> = inner
            .messages
            .values()
            .filter(|r| r.message.conversation_id == conversation_id)
            .map(|r| r.message.clone())
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        messages
    }

    /// Who has marked a message as read.
    pub fn read_by(&self, message_id: &str) -> HashSet<String> {
        self.inner
            .lock()
            .messages
            .get(message_id)
            .map(|r| r.read_by.clone())
            .unwrap_or_default()
    }

    /// Last persisted status for a user, if any.
    pub fn status_of(&self, user_id: &str) -> Option<UserStatus> {
        self.inner.lock().user_status.get(user_id).copied()
    }

    /// Last-message timestamp for a conversation, if set.
    pub fn last_message_at(&self, conversation_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .conversations
            .get(conversation_id)
            .and_then(|c| c.last_message_at)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_conversation_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation, StoreError> {
        let inner = self.inner.lock();
        let record = inner
            .conversations
            .get(conversation_id)
            .ok_or(StoreError::NotFound)?;
        if !record.participant_ids.iter().any(|id| id == user_id) {
            return Err(StoreError::Forbidden);
        }
        Ok(Conversation {
            id: conversation_id.to_string(),
            participant_ids: record.participant_ids.clone(),
            last_message_at: record.last_message_at,
        })
    }

    async fn create_message(&self, new: NewMessage) -> Result<StoredMessage, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.conversations.contains_key(&new.conversation_id) {
            return Err(StoreError::NotFound);
        }
        let message = StoredMessage {
            id: murmur_common::id::prefixed_ulid(murmur_common::id::prefix::MESSAGE),
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content,
            kind: new.kind,
            created_at: Utc::now(),
            status: MessageStatus::Sent,
        };
        inner.messages.insert(
            message.id.clone(),
            MessageRecord {
                message: message.clone(),
                read_by: HashSet::new(),
            },
        );
        Ok(message)
    }

    async fn update_conversation_last_message_at(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .conversations
            .get_mut(conversation_id)
            .ok_or(StoreError::NotFound)?;
        record.last_message_at = Some(at);
        Ok(())
    }

    async fn list_participants(
        &self,
        conversation_id: &str,
        requester_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let record = inner
            .conversations
            .get(conversation_id)
            .ok_or(StoreError::NotFound)?;
        if !record.participant_ids.iter().any(|id| id == requester_id) {
            return Err(StoreError::Forbidden);
        }
        Ok(record.participant_ids.clone())
    }

    async fn mark_message_read(&self, message_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .messages
            .get_mut(message_id)
            .ok_or(StoreError::NotFound)?;
        record.read_by.insert(user_id.to_string());
        Ok(())
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.conversations.contains_key(conversation_id) {
            return Err(StoreError::NotFound);
        }
        for record in inner.messages.values_mut() {
            if record.message.conversation_id == conversation_id
                && record.message.sender_id != user_id
            {
                record.read_by.insert(user_id.to_string());
            }
        }
        Ok(())
    }

    async fn update_user_status(
        &self,
        user_id: &str,
        status: UserStatus,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .user_status
            .insert(user_id.to_string(), status);
        Ok(())
    }

    async fn update_user_last_seen(&self, user_id: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .user_last_seen
            .insert(user_id.to_string(), Utc::now());
        Ok(())
    }
}
