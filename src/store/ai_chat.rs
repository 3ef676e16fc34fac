use std::collections::{HashMap, HashSet};
use log::debug;
use uuid::Uuid;
use crate::error::Result;
use crate::models::{
    AiChatSession, AiMessage, AiRole, ClientEvent, SessionStartedPayload, StreamChunkPayload,
    StreamingMessage,
};
use crate::services::socket_service::SocketClient;
use super::{Feedback, Store};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiChatState {
    pub sessions: Vec<AiChatSession>,
    pub messages: HashMap<String, Vec<AiMessage>>,
    pub current_session_id: Option<String>,
    /// Reply currently being generated, with its full text so far.
    pub streaming: Option<StreamingMessage>,
    /// Stream ids already flushed into `messages`.
    finalized: HashSet<String>,
    pub is_generating: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiChatAction {
    Pending,
    SessionsLoaded(Vec<AiChatSession>),
    MessagesLoaded {
        session_id: String,
        messages: Vec<AiMessage>,
    },
    SessionDeleted(String),
    SelectSession(Option<String>),
    SessionStarted(SessionStartedPayload),
    /// The user's prompt went out; a reply is expected.
    PromptSent(AiMessage),
    StreamChunk(StreamChunkPayload),
    MessageReceived(AiMessage),
    Rejected(String),
}

impl AiChatState {
    pub fn reduce(&mut self, action: AiChatAction) {
        match action {
            AiChatAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            AiChatAction::SessionsLoaded(sessions) => {
                self.loading = false;
                self.sessions = sessions;
            }
            AiChatAction::MessagesLoaded { session_id, messages } => {
                self.loading = false;
                self.messages.insert(session_id, messages);
            }
            AiChatAction::SessionDeleted(session_id) => {
                self.loading = false;
                self.sessions.retain(|s| s.id != session_id);
                for message in self.messages.remove(&session_id).unwrap_or_default() {
                    self.finalized.remove(&message.id);
                }
                if self.streaming.as_ref().is_some_and(|s| s.session_id == session_id) {
                    self.streaming = None;
                    self.is_generating = false;
                }
                if self.current_session_id.as_deref() == Some(session_id.as_str()) {
                    self.current_session_id = None;
                    self.streaming = None;
                    self.is_generating = false;
                }
            }
            AiChatAction::SelectSession(session_id) => self.current_session_id = session_id,
            AiChatAction::SessionStarted(payload) => {
                if !self.sessions.iter().any(|s| s.id == payload.session_id) {
                    self.sessions.insert(
                        0,
                        AiChatSession {
                            id: payload.session_id.clone(),
                            title: payload.title.unwrap_or_else(|| "New chat".to_string()),
                            message_count: 0,
                            updated_at: Some(chrono::Utc::now()),
                        },
                    );
                }
                self.messages.entry(payload.session_id.clone()).or_default();
                self.current_session_id = Some(payload.session_id);
            }
            AiChatAction::PromptSent(message) => {
                self.is_generating = true;
                self.error = None;
                self.push_message(message);
            }
            AiChatAction::StreamChunk(chunk) => self.apply_stream_chunk(chunk),
            AiChatAction::MessageReceived(message) => {
                if self.streaming.as_ref().is_some_and(|s| s.id == message.id) {
                    self.streaming = None;
                }
                self.finalized.insert(message.id.clone());
                self.is_generating = false;
                self.push_message(message);
            }
            AiChatAction::Rejected(message) => {
                self.loading = false;
                self.is_generating = false;
                self.error = Some(message);
            }
        }
    }

    pub fn session_messages(&self, session_id: &str) -> &[AiMessage] {
        self.messages.get(session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn current_messages(&self) -> &[AiMessage] {
        match &self.current_session_id {
            Some(id) => self.session_messages(id),
            None => &[],
        }
    }

    fn apply_stream_chunk(&mut self, chunk: StreamChunkPayload) {
        if self.finalized.contains(&chunk.message_id) {
            debug!("Ignoring chunk for finished stream {}", chunk.message_id);
            return;
        }

        if self.streaming.as_ref().map_or(true, |s| s.id != chunk.message_id) {
            self.streaming = Some(StreamingMessage {
                id: chunk.message_id.clone(),
                session_id: chunk.session_id.clone(),
                content: String::new(),
            });
        }
        let Some(buffer) = self.streaming.as_mut() else {
            return;
        };
        match chunk.accumulated {
            Some(full) => buffer.content = full,
            None => buffer.content.push_str(&chunk.chunk),
        }
        self.is_generating = true;

        if chunk.done {
            self.finalize_stream();
        }
    }

    /// Move the streaming buffer into the session's messages, at most once per
    /// stream id.
    pub fn finalize_stream(&mut self) {
        let Some(buffer) = self.streaming.take() else {
            return;
        };
        self.is_generating = false;
        if !self.finalized.insert(buffer.id.clone()) {
            return;
        }
        self.push_message(AiMessage {
            id: buffer.id,
            session_id: buffer.session_id,
            role: AiRole::Assistant,
            content: buffer.content,
            created_at: Some(chrono::Utc::now()),
        });
    }

    fn push_message(&mut self, message: AiMessage) {
        let list = self.messages.entry(message.session_id.clone()).or_default();
        if list.iter().any(|m| m.id == message.id) {
            return;
        }
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == message.session_id) {
            session.message_count += 1;
            session.updated_at = message.created_at.or(session.updated_at);
        }
        list.push(message);
    }
}

impl Store {
    pub async fn fetch_ai_sessions(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("ai-chat/sessions".to_string()) else {
            return Ok(());
        };
        self.run(
            "ai-chat/sessions",
            Feedback::Read,
            |s| s.ai_chat.reduce(AiChatAction::Pending),
            async { self.api().get_ai_sessions().await?.into_data_or_default() },
            |s, sessions: &Vec<AiChatSession>| s.ai_chat.reduce(AiChatAction::SessionsLoaded(sessions.clone())),
            |s, message| s.ai_chat.reduce(AiChatAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn fetch_ai_session_messages(&self, session_id: &str) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("ai-chat/messages/{}", session_id)) else {
            return Ok(());
        };
        self.run(
            "ai-chat/messages",
            Feedback::Read,
            |s| s.ai_chat.reduce(AiChatAction::Pending),
            async { self.api().get_ai_session_messages(session_id).await?.into_data_or_default() },
            |s, messages: &Vec<AiMessage>| {
                s.ai_chat.reduce(AiChatAction::MessagesLoaded {
                    session_id: session_id.to_string(),
                    messages: messages.clone(),
                })
            },
            |s, message| s.ai_chat.reduce(AiChatAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_ai_session(&self, session_id: &str) -> Result<()> {
        self.run(
            "ai-chat/delete",
            Feedback::Mutation("Chat deleted"),
            |s| s.ai_chat.reduce(AiChatAction::Pending),
            async { self.api().delete_ai_session(session_id).await?.ensure_success() },
            |s, _: &()| s.ai_chat.reduce(AiChatAction::SessionDeleted(session_id.to_string())),
            |s, message| s.ai_chat.reduce(AiChatAction::Rejected(message)),
        )
        .await
    }

    pub fn select_ai_session(&self, session_id: Option<&str>) {
        self.dispatch(|s| s.ai_chat.reduce(AiChatAction::SelectSession(session_id.map(str::to_string))));
    }

    /// Ask the server for a new assistant session; it answers with
    /// `model:session-started`.
    pub fn start_ai_chat(&self, socket: &SocketClient, title: Option<String>) -> Result<()> {
        socket.emit(&ClientEvent::StartChat { title })
    }

    /// Send a prompt over the socket and show it immediately. The reply
    /// arrives as a stream of events.
    pub fn send_ai_message(&self, socket: &SocketClient, session_id: &str, content: &str) -> Result<()> {
        socket.emit(&ClientEvent::ChatMessage {
            session_id: session_id.to_string(),
            content: content.to_string(),
        })?;
        let prompt = AiMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: AiRole::User,
            content: content.to_string(),
            created_at: Some(chrono::Utc::now()),
        };
        self.dispatch(|s| s.ai_chat.reduce(AiChatAction::PromptSent(prompt)));
        Ok(())
    }

    pub fn regenerate_ai_response(&self, socket: &SocketClient, session_id: &str, message_id: &str) -> Result<()> {
        socket.emit(&ClientEvent::RegenerateResponse {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
        })?;
        self.dispatch(|s| s.ai_chat.is_generating = true);
        Ok(())
    }
}
