//! Session lifecycle and request handlers.
//!
//! Every request handler traps storage and authorization failures and
//! returns them as `{ "error": ... }` reply payloads; nothing here may
//! close the connection or escape the dispatch loop.

use chrono::Utc;
use serde_json::{json, Value};

use crate::error::EventError;
use crate::store::{NewMessage, UserStatus};
use crate::AppState;

use super::events::{
    ClientEvent, ConversationRef, EventName, MarkAsReadPayload, SendMessagePayload, ServerEvent,
};
use super::fanout::room_name;
use super::session::ConnectionSession;

/// Bookkeeping for a connection that just authenticated.
///
/// Records presence, persists and broadcasts the offline→online transition
/// when this is the user's first connection, and returns the `connected`
/// ack for the new connection only.
pub async fn on_connect(state: &AppState, session: &ConnectionSession) -> ServerEvent {
    let user_id = session.user_id();
    let first = state
        .presence
        .record_connect(user_id, &session.connection_id);

    if first {
        // Status writes are best-effort: presence truth lives in the
        // registry and a storage hiccup must not refuse the connection.
        if let Err(err) = state.store.update_user_status(user_id, UserStatus::Online).await {
            tracing::warn!(%user_id, %err, "failed to persist online status");
        }
        if let Err(err) = state.store.update_user_last_seen(user_id).await {
            tracing::warn!(%user_id, %err, "failed to persist last-seen");
        }
        state.notifier().to_everyone(
            EventName::USER_STATUS,
            json!({
                "userId": user_id,
                "status": UserStatus::Online.as_str(),
                "timestamp": Utc::now(),
            }),
        );
    }

    ServerEvent::new(
        EventName::CONNECTED,
        json!({
            "message": "connected",
            "userId": user_id,
            "socketId": session.connection_id,
        }),
    )
}

/// Bookkeeping for a closed connection, from any cause.
///
/// Persists and broadcasts the online→offline transition when this was the
/// user's last connection. Safe to call for sessions whose connect
/// bookkeeping never ran.
pub async fn on_disconnect(state: &AppState, session: &ConnectionSession) {
    let user_id = session.user_id();
    let last = state
        .presence
        .record_disconnect(user_id, &session.connection_id);

    if last {
        if let Err(err) = state.store.update_user_status(user_id, UserStatus::Offline).await {
            tracing::warn!(%user_id, %err, "failed to persist offline status");
        }
        if let Err(err) = state.store.update_user_last_seen(user_id).await {
            tracing::warn!(%user_id, %err, "failed to persist last-seen");
        }
        state.notifier().to_everyone(
            EventName::USER_STATUS,
            json!({
                "userId": user_id,
                "status": UserStatus::Offline.as_str(),
                "timestamp": Utc::now(),
            }),
        );
    }
}

/// Route one client request to its handler and build the reply envelope.
pub async fn dispatch(
    state: &AppState,
    session: &ConnectionSession,
    event: ClientEvent,
) -> ServerEvent {
    let name = event.name();
    let result = match event {
        ClientEvent::JoinConversation(payload) => join_conversation(state, session, payload).await,
        ClientEvent::LeaveConversation(payload) => leave_conversation(session, payload),
        ClientEvent::SendMessage(payload) => send_message(state, session, payload).await,
        ClientEvent::TypingStart(payload) => typing(state, session, payload, true),
        ClientEvent::TypingStop(payload) => typing(state, session, payload, false),
        ClientEvent::MarkAsRead(payload) => mark_as_read(state, session, payload).await,
        ClientEvent::MarkConversationAsRead(payload) => {
            mark_conversation_as_read(state, session, payload).await
        }
    };

    match result {
        Ok(data) => ServerEvent::new(name, data),
        Err(err) => ServerEvent::new(name, json!({ "error": err.message })),
    }
}

async fn join_conversation(
    state: &AppState,
    session: &ConnectionSession,
    payload: ConversationRef,
) -> Result<Value, EventError> {
    state
        .store
        .find_conversation_participant(&payload.conversation_id, session.user_id())
        .await
        .map_err(|e| EventError::from_store(e, "join conversation"))?;

    session.join_room(&room_name(&payload.conversation_id));
    Ok(json!({ "success": true, "conversationId": payload.conversation_id }))
}

fn leave_conversation(
    session: &ConnectionSession,
    payload: ConversationRef,
) -> Result<Value, EventError> {
    // No re-authorization to leave.
    session.leave_room(&room_name(&payload.conversation_id));
    Ok(json!({ "success": true, "conversationId": payload.conversation_id }))
}

async fn send_message(
    state: &AppState,
    session: &ConnectionSession,
    payload: SendMessagePayload,
) -> Result<Value, EventError> {
    let user_id = session.user_id();

    // Re-check membership on every send; a participant may have been
    // removed since the room was joined.
    state
        .store
        .find_conversation_participant(&payload.conversation_id, user_id)
        .await
        .map_err(|e| EventError::from_store(e, "send message"))?;

    let message = state
        .store
        .create_message(NewMessage {
            conversation_id: payload.conversation_id,
            sender_id: user_id.to_string(),
            content: payload.content,
            kind: payload.kind,
        })
        .await
        .map_err(|e| EventError::from_store(e, "send message"))?;

    // The message is durable from here on; everything below is best-effort
    // fan-out. A crash leaves it persisted but unannounced, and clients
    // reconcile on their next fetch.
    if let Err(err) = state
        .store
        .update_conversation_last_message_at(&message.conversation_id, message.created_at)
        .await
    {
        tracing::warn!(
            conversation_id = %message.conversation_id,
            %err,
            "failed to bump conversation last-message timestamp"
        );
    }

    let message_json = serde_json::to_value(&message).unwrap_or_default();
    state.notifier().to_room(
        &message.conversation_id,
        EventName::NEW_MESSAGE,
        message_json.clone(),
    );

    // Participants who aren't watching the room still see their
    // conversation list move.
    match state
        .store
        .list_participants(&message.conversation_id, user_id)
        .await
    {
        Ok(participants) => {
            let update = json!({
                "conversationId": message.conversation_id,
                "lastMessage": {
                    "content": message.content,
                    "senderId": message.sender_id,
                    "createdAt": message.created_at,
                },
                "lastMessageAt": message.created_at,
            });
            for participant in participants.iter().filter(|id| id.as_str() != user_id) {
                state.notifier().to_user(
                    participant,
                    EventName::CONVERSATION_UPDATED,
                    update.clone(),
                );
            }
        }
        Err(err) => {
            tracing::warn!(
                conversation_id = %message.conversation_id,
                %err,
                "failed to list participants for conversation update"
            );
        }
    }

    Ok(json!({ "success": true, "message": message_json }))
}

fn typing(
    state: &AppState,
    session: &ConnectionSession,
    payload: ConversationRef,
    is_typing: bool,
) -> Result<Value, EventError> {
    // Ephemeral signal: no persistence, no membership re-check, and the
    // sender's own connection never sees the echo.
    state.notifier().to_room_except(
        &payload.conversation_id,
        &session.connection_id,
        EventName::USER_TYPING,
        json!({
            "conversationId": payload.conversation_id,
            "userId": session.user_id(),
            "username": session.username(),
            "isTyping": is_typing,
        }),
    );
    Ok(json!({ "success": true }))
}

async fn mark_as_read(
    state: &AppState,
    session: &ConnectionSession,
    payload: MarkAsReadPayload,
) -> Result<Value, EventError> {
    let user_id = session.user_id();

    for message_id in &payload.message_ids {
        // Best-effort: one bad id must not abort the rest.
        if let Err(err) = state.store.mark_message_read(message_id, user_id).await {
            tracing::warn!(%message_id, %user_id, %err, "failed to mark message read");
        }
    }

    state.notifier().to_room(
        &payload.conversation_id,
        EventName::MESSAGES_READ,
        json!({
            "conversationId": payload.conversation_id,
            "messageIds": payload.message_ids,
            "readBy": user_id,
            "username": session.username(),
        }),
    );
    Ok(json!({ "success": true }))
}

async fn mark_conversation_as_read(
    state: &AppState,
    session: &ConnectionSession,
    payload: ConversationRef,
) -> Result<Value, EventError> {
    state
        .store
        .mark_conversation_read(&payload.conversation_id, session.user_id())
        .await
        .map_err(|e| EventError::from_store(e, "mark conversation as read"))?;
    // Bulk catch-up on conversation open; no broadcast.
    Ok(json!({ "success": true }))
}
