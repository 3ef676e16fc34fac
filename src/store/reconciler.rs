//! Applies server-pushed events to the state tree.
//!
//! Every handler tolerates ids it has never seen: an unknown room or session
//! starts from an empty default instead of failing.

use log::{debug, trace};
use crate::models::{ChatMessage, MessageReadPayload, ServerEvent, TypingPayload};
use super::ai_chat::AiChatAction;
use super::documents::DocumentsAction;
use super::RootState;

pub fn reconcile(state: &mut RootState, event: ServerEvent) {
    trace!("Reconciling {}", event.name());
    match event {
        ServerEvent::NewMessage(message) => new_message(state, message),
        ServerEvent::UserTyping(payload) => typing(state, payload, true),
        ServerEvent::UserStopTyping(payload) => typing(state, payload, false),
        ServerEvent::MessageRead(payload) => message_read(state, payload),
        ServerEvent::OnlineStatus(payload) => {
            state.chat.online_users = payload.user_ids.into_iter().collect();
        }
        ServerEvent::UserOnline(payload) => {
            state.chat.online_users.insert(payload.user_id);
        }
        ServerEvent::UserOffline(payload) => {
            state.chat.online_users.remove(&payload.user_id);
        }

        ServerEvent::ModelSessionStarted(payload) => {
            state.ai_chat.reduce(AiChatAction::SessionStarted(payload));
        }
        ServerEvent::ModelMessageStream(chunk) => {
            state.ai_chat.reduce(AiChatAction::StreamChunk(chunk));
        }
        ServerEvent::ModelMessageReceived(message) => {
            state.ai_chat.reduce(AiChatAction::MessageReceived(message));
        }

        ServerEvent::SummaryProgress(p) => state.documents.reduce(DocumentsAction::SummaryProgress {
            document_id: p.document_id,
            progress: p.progress,
            stage: p.stage,
        }),
        ServerEvent::SummaryStream(p) => state.documents.reduce(DocumentsAction::SummaryChunk {
            document_id: p.document_id,
            chunk: p.chunk,
        }),
        ServerEvent::SummaryComplete(p) => state.documents.reduce(DocumentsAction::SummaryComplete {
            document_id: p.document_id,
            summary: p.summary,
        }),
        ServerEvent::SummaryError(p) => state.documents.reduce(DocumentsAction::SummaryFailed {
            document_id: p.document_id,
            error: p.error,
        }),
    }
}

fn new_message(state: &mut RootState, message: ChatMessage) {
    let room_id = message.room_id.clone();
    let sender_id = message.sender_id.clone();

    if let Some(typing) = state.chat.typing.get_mut(&room_id) {
        typing.remove(&sender_id);
    }
    if !state.chat.insert_incoming(message) {
        return;
    }

    let own = state.auth.current_user_id() == Some(sender_id.as_str());
    let viewing = state.chat.active_room_id.as_deref() == Some(room_id.as_str());
    if own || viewing {
        return;
    }
    *state.chat.unread.entry(room_id.clone()).or_insert(0) += 1;
    if let Some(room) = state.chat.rooms.iter_mut().find(|r| r.id == room_id) {
        room.unread_count += 1;
    }
    debug!("Unread in {} is now {}", room_id, state.chat.unread_count(&room_id));
}

fn typing(state: &mut RootState, payload: TypingPayload, started: bool) {
    if state.auth.current_user_id() == Some(payload.user_id.as_str()) {
        return;
    }
    if started {
        state.chat.typing.entry(payload.room_id).or_default().insert(payload.user_id);
    } else if let Some(users) = state.chat.typing.get_mut(&payload.room_id) {
        users.remove(&payload.user_id);
        if users.is_empty() {
            state.chat.typing.remove(&payload.room_id);
        }
    }
}

fn message_read(state: &mut RootState, payload: MessageReadPayload) {
    if let Some(messages) = state.chat.messages.get_mut(&payload.room_id) {
        for message in messages.iter_mut() {
            let targeted = payload.message_ids.is_empty() || payload.message_ids.contains(&message.id);
            if targeted && !message.read_by.contains(&payload.user_id) {
                message.read_by.push(payload.user_id.clone());
            }
        }
    }
    if state.auth.current_user_id() == Some(payload.user_id.as_str()) {
        state.chat.unread.insert(payload.room_id.clone(), 0);
        if let Some(room) = state.chat.rooms.iter_mut().find(|r| r.id == payload.room_id) {
            room.unread_count = 0;
        }
    }
}
