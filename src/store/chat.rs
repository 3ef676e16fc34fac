use std::collections::{HashMap, HashSet};
use log::debug;
use uuid::Uuid;
use crate::error::Result;
use crate::models::{ChatMessage, ChatRoom, CreateRoomRequest, PageMeta, SendMessageRequest};
use crate::services::api_service::unread_map;
use super::{Feedback, Store};

pub const MESSAGE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub rooms: Vec<ChatRoom>,
    pub messages: HashMap<String, Vec<ChatMessage>>,
    pub pagination: HashMap<String, PageMeta>,
    pub unread: HashMap<String, u32>,
    pub active_room_id: Option<String>,
    pub typing: HashMap<String, HashSet<String>>,
    pub online_users: HashSet<String>,
    pub loading: bool,
    pub sending: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    Pending,
    RoomsLoaded(Vec<ChatRoom>),
    RoomCreated(ChatRoom),
    MessagesLoaded {
        room_id: String,
        messages: Vec<ChatMessage>,
        meta: Option<PageMeta>,
        page: u32,
    },
    /// Optimistic copy appended before the server answers.
    MessageQueued(ChatMessage),
    MessageConfirmed {
        client_id: String,
        message: ChatMessage,
    },
    MessageFailed {
        room_id: String,
        client_id: String,
        error: String,
    },
    SetActiveRoom(Option<String>),
    MarkedRead(String),
    UnreadCountsLoaded(HashMap<String, u32>),
    Rejected(String),
}

impl ChatState {
    pub fn reduce(&mut self, action: ChatAction) {
        match action {
            ChatAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            ChatAction::RoomsLoaded(rooms) => {
                self.loading = false;
                for room in &rooms {
                    self.unread.insert(room.id.clone(), room.unread_count);
                }
                self.rooms = rooms;
            }
            ChatAction::RoomCreated(room) => {
                self.loading = false;
                if !self.rooms.iter().any(|r| r.id == room.id) {
                    self.rooms.insert(0, room);
                }
            }
            ChatAction::MessagesLoaded { room_id, messages, meta, page } => {
                self.loading = false;
                let existing = self.messages.entry(room_id.clone()).or_default();
                if page <= 1 {
                    *existing = messages;
                } else {
                    // Older page: prepend whatever is not already shown.
                    let known: HashSet<String> = existing.iter().map(|m| m.id.clone()).collect();
                    let mut older: Vec<ChatMessage> =
                        messages.into_iter().filter(|m| !known.contains(&m.id)).collect();
                    older.append(existing);
                    *existing = older;
                }
                if let Some(meta) = meta {
                    self.pagination.insert(room_id, meta);
                }
            }
            ChatAction::MessageQueued(message) => {
                self.sending = true;
                self.touch_room(&message);
                self.messages.entry(message.room_id.clone()).or_default().push(message);
            }
            ChatAction::MessageConfirmed { client_id, message } => {
                self.sending = false;
                self.touch_room(&message);
                let list = self.messages.entry(message.room_id.clone()).or_default();
                let broadcast_seen = list.iter().any(|m| m.id == message.id);
                match list.iter().position(|m| m.pending && m.id == client_id) {
                    Some(pos) if broadcast_seen => {
                        list.remove(pos);
                    }
                    Some(pos) => list[pos] = message,
                    None if !broadcast_seen => list.push(message),
                    None => {}
                }
            }
            ChatAction::MessageFailed { room_id, client_id, error } => {
                self.sending = false;
                if let Some(list) = self.messages.get_mut(&room_id) {
                    list.retain(|m| !(m.pending && m.id == client_id));
                }
                self.error = Some(error);
            }
            ChatAction::SetActiveRoom(room_id) => {
                if let Some(id) = &room_id {
                    self.unread.insert(id.clone(), 0);
                }
                self.active_room_id = room_id;
            }
            ChatAction::MarkedRead(room_id) => {
                self.unread.insert(room_id.clone(), 0);
                if let Some(room) = self.rooms.iter_mut().find(|r| r.id == room_id) {
                    room.unread_count = 0;
                }
            }
            ChatAction::UnreadCountsLoaded(counts) => {
                for (room_id, count) in counts {
                    // The open room is being read right now.
                    if self.active_room_id.as_deref() == Some(room_id.as_str()) {
                        continue;
                    }
                    self.unread.insert(room_id, count);
                }
            }
            ChatAction::Rejected(message) => {
                self.loading = false;
                self.sending = false;
                self.error = Some(message);
            }
        }
    }

    /// Messages of a room; unknown rooms read as empty.
    pub fn room_messages(&self, room_id: &str) -> &[ChatMessage] {
        self.messages.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unread_count(&self, room_id: &str) -> u32 {
        self.unread.get(room_id).copied().unwrap_or(0)
    }

    pub fn total_unread(&self) -> u32 {
        self.unread.values().sum()
    }

    pub fn typing_users(&self, room_id: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .typing
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_users.contains(user_id)
    }

    /// Append an inbound message unless it is already present. A pending
    /// optimistic copy carrying the same client id is replaced in place.
    /// Returns whether the room gained a new entry.
    pub fn insert_incoming(&mut self, message: ChatMessage) -> bool {
        self.touch_room(&message);
        let list = self.messages.entry(message.room_id.clone()).or_default();
        if list.iter().any(|m| m.id == message.id) {
            debug!("Message {} already in room {}", message.id, message.room_id);
            return false;
        }
        if let Some(client_id) = &message.client_id {
            if let Some(pos) = list.iter().position(|m| m.pending && &m.id == client_id) {
                list[pos] = message;
                return false;
            }
        }
        list.push(message);
        true
    }

    fn touch_room(&mut self, message: &ChatMessage) {
        if let Some(room) = self.rooms.iter_mut().find(|r| r.id == message.room_id) {
            room.last_message = Some(message.clone());
            if message.created_at.is_some() {
                room.updated_at = message.created_at;
            }
        }
    }
}

impl Store {
    pub async fn fetch_rooms(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("chat/rooms".to_string()) else {
            return Ok(());
        };
        self.run(
            "chat/rooms",
            Feedback::Read,
            |s| s.chat.reduce(ChatAction::Pending),
            async { self.api().get_user_chat_rooms().await?.into_data_or_default() },
            |s, rooms: &Vec<ChatRoom>| s.chat.reduce(ChatAction::RoomsLoaded(rooms.clone())),
            |s, message| s.chat.reduce(ChatAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn create_room(&self, participant_id: &str, consultation_id: Option<String>) -> Result<ChatRoom> {
        let request = CreateRoomRequest {
            participant_id: participant_id.to_string(),
            consultation_id,
        };
        self.run(
            "chat/create-room",
            Feedback::Mutation("Conversation started"),
            |s| s.chat.reduce(ChatAction::Pending),
            async { self.api().create_chat_room(&request).await?.into_data() },
            |s, room: &ChatRoom| s.chat.reduce(ChatAction::RoomCreated(room.clone())),
            |s, message| s.chat.reduce(ChatAction::Rejected(message)),
        )
        .await
    }

    pub async fn fetch_messages(&self, room_id: &str, page: u32) -> Result<()> {
        let key = format!("chat/messages/{}/{}", room_id, page);
        let Some(_in_flight) = self.begin_request(key) else {
            return Ok(());
        };
        self.run(
            "chat/messages",
            Feedback::Read,
            |s| s.chat.reduce(ChatAction::Pending),
            async {
                self.api()
                    .get_room_messages(room_id, page, MESSAGE_PAGE_SIZE)
                    .await?
                    .into_page()
            },
            |s, (messages, meta): &(Vec<ChatMessage>, Option<PageMeta>)| {
                s.chat.reduce(ChatAction::MessagesLoaded {
                    room_id: room_id.to_string(),
                    messages: messages.clone(),
                    meta: *meta,
                    page,
                })
            },
            |s, message| s.chat.reduce(ChatAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    /// Optimistically append, then swap in the server's copy.
    pub async fn send_message(&self, room_id: &str, content: &str) -> Result<ChatMessage> {
        let client_id = Uuid::new_v4().to_string();
        let sender_id = self.select(|s| s.auth.current_user_id().unwrap_or_default().to_string());
        let optimistic = ChatMessage {
            id: client_id.clone(),
            room_id: room_id.to_string(),
            sender_id,
            content: content.to_string(),
            created_at: Some(chrono::Utc::now()),
            read_by: Vec::new(),
            client_id: Some(client_id.clone()),
            pending: true,
        };
        let request = SendMessageRequest {
            content: content.to_string(),
            client_id: Some(client_id.clone()),
        };

        let confirm_id = client_id.clone();
        self.run(
            "chat/send",
            Feedback::Read,
            |s| s.chat.reduce(ChatAction::MessageQueued(optimistic)),
            async { self.api().send_room_message(room_id, &request).await?.into_data() },
            |s, message: &ChatMessage| {
                s.chat.reduce(ChatAction::MessageConfirmed {
                    client_id: confirm_id,
                    message: message.clone(),
                })
            },
            |s, error| {
                s.chat.reduce(ChatAction::MessageFailed {
                    room_id: room_id.to_string(),
                    client_id,
                    error,
                });
            },
        )
        .await
    }

    /// Focus a room; its unread counter drops to zero locally.
    pub fn set_active_room(&self, room_id: Option<&str>) {
        self.dispatch(|s| s.chat.reduce(ChatAction::SetActiveRoom(room_id.map(str::to_string))));
    }

    pub async fn mark_room_read(&self, room_id: &str) -> Result<()> {
        self.run(
            "chat/mark-read",
            Feedback::Read,
            |_| {},
            async { self.api().mark_room_read(room_id).await?.ensure_success() },
            |s, _: &()| s.chat.reduce(ChatAction::MarkedRead(room_id.to_string())),
            |s, message| s.chat.reduce(ChatAction::Rejected(message)),
        )
        .await
    }

    /// Background poll; failures are logged only.
    pub async fn poll_unread_counts(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("chat/unread".to_string()) else {
            return Ok(());
        };
        self.run(
            "chat/unread",
            Feedback::Background,
            |_| {},
            async { Ok(unread_map(self.api().get_unread_counts().await?.into_data_or_default()?)) },
            |s, counts: &HashMap<String, u32>| s.chat.reduce(ChatAction::UnreadCountsLoaded(counts.clone())),
            |_, _| {},
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, room: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            room_id: room.to_string(),
            sender_id: "u1".to_string(),
            content: format!("message {}", id),
            created_at: None,
            read_by: Vec::new(),
            client_id: None,
            pending: false,
        }
    }

    fn pending(client_id: &str, room: &str) -> ChatMessage {
        ChatMessage {
            client_id: Some(client_id.to_string()),
            pending: true,
            ..message(client_id, room)
        }
    }

    #[test]
    fn confirmation_replaces_optimistic_copy() {
        let mut state = ChatState::default();
        state.reduce(ChatAction::MessageQueued(pending("tmp-1", "r1")));
        state.reduce(ChatAction::MessageConfirmed {
            client_id: "tmp-1".into(),
            message: message("m1", "r1"),
        });
        let messages = state.room_messages("r1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
        assert!(!messages[0].pending);
        assert!(!state.sending);
    }

    #[test]
    fn confirmation_after_broadcast_does_not_duplicate() {
        let mut state = ChatState::default();
        state.reduce(ChatAction::MessageQueued(pending("tmp-1", "r1")));
        assert!(state.insert_incoming(message("m1", "r1")));
        state.reduce(ChatAction::MessageConfirmed {
            client_id: "tmp-1".into(),
            message: message("m1", "r1"),
        });
        let ids: Vec<&str> = state.room_messages("r1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1"]);
    }

    #[test]
    fn failed_send_removes_optimistic_copy() {
        let mut state = ChatState::default();
        state.reduce(ChatAction::MessageQueued(pending("tmp-1", "r1")));
        state.reduce(ChatAction::MessageFailed {
            room_id: "r1".into(),
            client_id: "tmp-1".into(),
            error: "Network error".into(),
        });
        assert!(state.room_messages("r1").is_empty());
        assert_eq!(state.error.as_deref(), Some("Network error"));
    }

    #[test]
    fn older_pages_are_prepended_without_duplicates() {
        let mut state = ChatState::default();
        state.reduce(ChatAction::MessagesLoaded {
            room_id: "r1".into(),
            messages: vec![message("m3", "r1"), message("m4", "r1")],
            meta: None,
            page: 1,
        });
        state.reduce(ChatAction::MessagesLoaded {
            room_id: "r1".into(),
            messages: vec![message("m1", "r1"), message("m2", "r1"), message("m3", "r1")],
            meta: None,
            page: 2,
        });
        let ids: Vec<&str> = state.room_messages("r1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn activating_a_room_clears_its_unread_counter() {
        let mut state = ChatState::default();
        state.reduce(ChatAction::UnreadCountsLoaded(HashMap::from([
            ("r1".to_string(), 3),
            ("r2".to_string(), 1),
        ])));
        state.reduce(ChatAction::SetActiveRoom(Some("r1".into())));
        assert_eq!(state.unread_count("r1"), 0);
        assert_eq!(state.total_unread(), 1);

        // A later poll must not resurrect the open room's count.
        state.reduce(ChatAction::UnreadCountsLoaded(HashMap::from([("r1".to_string(), 3)])));
        assert_eq!(state.unread_count("r1"), 0);
    }

    #[test]
    fn unknown_room_reads_as_empty() {
        let state = ChatState::default();
        assert!(state.room_messages("nope").is_empty());
        assert_eq!(state.unread_count("nope"), 0);
        assert!(state.typing_users("nope").is_empty());
    }
}
