use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::error::{ApiError, Result};
use super::{AiMessage, ChatMessage};

// ============================================================================
// WIRE FRAME
// ============================================================================

/// One socket frame: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

const SERVER_EVENT_NAMES: &[&str] = &[
    "chat:new-message",
    "chat:user-typing",
    "chat:user-stop-typing",
    "chat:message-read",
    "chat:online-status",
    "user-online",
    "user-offline",
    "model:session-started",
    "model:message-stream",
    "model:message-received",
    "summary:progress",
    "summary:stream",
    "summary:complete",
    "summary:error",
];

// ============================================================================
// INBOUND EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub room_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub room_id: String,
    pub user_id: String,
    /// Empty means every message in the room.
    #[serde(default)]
    pub message_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatusPayload {
    #[serde(default, alias = "onlineUsers")]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedPayload {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunkPayload {
    pub session_id: String,
    #[serde(alias = "streamId")]
    pub message_id: String,
    /// Newly generated text.
    #[serde(default, alias = "token", alias = "content")]
    pub chunk: String,
    /// Full text so far, when the server sends it; replaces the buffer.
    #[serde(default, alias = "fullContent")]
    pub accumulated: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryProgressPayload {
    pub document_id: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStreamPayload {
    pub document_id: String,
    #[serde(default, alias = "content")]
    pub chunk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCompletePayload {
    pub document_id: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryErrorPayload {
    pub document_id: String,
    #[serde(default, alias = "message")]
    pub error: String,
}

/// Server-pushed event, discriminated by its event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "chat:new-message")]
    NewMessage(ChatMessage),
    #[serde(rename = "chat:user-typing")]
    UserTyping(TypingPayload),
    #[serde(rename = "chat:user-stop-typing")]
    UserStopTyping(TypingPayload),
    #[serde(rename = "chat:message-read")]
    MessageRead(MessageReadPayload),
    #[serde(rename = "chat:online-status")]
    OnlineStatus(OnlineStatusPayload),
    #[serde(rename = "user-online")]
    UserOnline(PresencePayload),
    #[serde(rename = "user-offline")]
    UserOffline(PresencePayload),
    #[serde(rename = "model:session-started")]
    ModelSessionStarted(SessionStartedPayload),
    #[serde(rename = "model:message-stream")]
    ModelMessageStream(StreamChunkPayload),
    #[serde(rename = "model:message-received")]
    ModelMessageReceived(AiMessage),
    #[serde(rename = "summary:progress")]
    SummaryProgress(SummaryProgressPayload),
    #[serde(rename = "summary:stream")]
    SummaryStream(SummaryStreamPayload),
    #[serde(rename = "summary:complete")]
    SummaryComplete(SummaryCompletePayload),
    #[serde(rename = "summary:error")]
    SummaryError(SummaryErrorPayload),
}

impl ServerEvent {
    /// Parse a raw text frame, rejecting event names this client does not consume.
    pub fn from_frame(text: &str) -> Result<Self> {
        let frame: EventFrame = serde_json::from_str(text)?;
        Self::from_parts(&frame.event, frame.data)
    }

    pub fn from_parts(name: &str, data: Value) -> Result<Self> {
        if !SERVER_EVENT_NAMES.contains(&name) {
            return Err(ApiError::UnknownEvent(name.to_string()));
        }
        Ok(serde_json::from_value(json!({ "event": name, "data": data }))?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "chat:new-message",
            ServerEvent::UserTyping(_) => "chat:user-typing",
            ServerEvent::UserStopTyping(_) => "chat:user-stop-typing",
            ServerEvent::MessageRead(_) => "chat:message-read",
            ServerEvent::OnlineStatus(_) => "chat:online-status",
            ServerEvent::UserOnline(_) => "user-online",
            ServerEvent::UserOffline(_) => "user-offline",
            ServerEvent::ModelSessionStarted(_) => "model:session-started",
            ServerEvent::ModelMessageStream(_) => "model:message-stream",
            ServerEvent::ModelMessageReceived(_) => "model:message-received",
            ServerEvent::SummaryProgress(_) => "summary:progress",
            ServerEvent::SummaryStream(_) => "summary:stream",
            ServerEvent::SummaryComplete(_) => "summary:complete",
            ServerEvent::SummaryError(_) => "summary:error",
        }
    }
}

// ============================================================================
// OUTBOUND EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "auth:authenticate")]
    Authenticate { token: String },
    #[serde(rename = "summary:submit", rename_all = "camelCase")]
    SummarySubmit { document_id: String },
    #[serde(rename = "summary:retry", rename_all = "camelCase")]
    SummaryRetry { document_id: String },
    #[serde(rename = "summary:abort", rename_all = "camelCase")]
    SummaryAbort { document_id: String },
    #[serde(rename = "start_chat", rename_all = "camelCase")]
    StartChat {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename = "chat_message", rename_all = "camelCase")]
    ChatMessage { session_id: String, content: String },
    #[serde(rename = "regenerate_response", rename_all = "camelCase")]
    RegenerateResponse { session_id: String, message_id: String },
    #[serde(rename = "chat:join-room", rename_all = "camelCase")]
    JoinRoom { room_id: String },
    #[serde(rename = "chat:leave-room", rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    #[serde(rename = "chat:send-message", rename_all = "camelCase")]
    SendMessage {
        room_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    #[serde(rename = "chat:typing", rename_all = "camelCase")]
    Typing { room_id: String },
    #[serde(rename = "chat:stop-typing", rename_all = "camelCase")]
    StopTyping { room_id: String },
    #[serde(rename = "chat:mark-read", rename_all = "camelCase")]
    MarkRead { room_id: String },
}

impl ClientEvent {
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_message_frame() {
        let frame = r#"{"event":"chat:new-message","data":{"_id":"m1","roomId":"r1","senderId":"u2","content":"hello"}}"#;
        match ServerEvent::from_frame(frame).unwrap() {
            ServerEvent::NewMessage(message) => {
                assert_eq!(message.id, "m1");
                assert_eq!(message.room_id, "r1");
                assert!(!message.pending);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn stream_chunk_accepts_token_alias() {
        let event = ServerEvent::from_parts(
            "model:message-stream",
            json!({ "sessionId": "s", "streamId": "s1", "token": "Hel", "done": false }),
        )
        .unwrap();
        match event {
            ServerEvent::ModelMessageStream(chunk) => {
                assert_eq!(chunk.message_id, "s1");
                assert_eq!(chunk.chunk, "Hel");
                assert!(chunk.accumulated.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_is_rejected_at_the_boundary() {
        let result = ServerEvent::from_frame(r#"{"event":"chat:explode","data":{}}"#);
        assert!(matches!(result, Err(ApiError::UnknownEvent(name)) if name == "chat:explode"));
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let result = ServerEvent::from_parts("chat:user-typing", json!({ "roomId": 5 }));
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn client_events_serialize_with_event_names() {
        let frame = ClientEvent::SendMessage {
            room_id: "r1".into(),
            content: "hi".into(),
            client_id: None,
        }
        .to_frame()
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "chat:send-message");
        assert_eq!(value["data"]["roomId"], "r1");
        assert!(value["data"].get("clientId").is_none());
    }

    #[test]
    fn event_name_matches_wire_name() {
        let event = ServerEvent::UserOnline(PresencePayload { user_id: "u1".into() });
        assert_eq!(event.name(), "user-online");
    }
}
