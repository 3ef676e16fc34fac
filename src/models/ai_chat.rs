use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiRole {
    #[default]
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMessage {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub role: AiRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiChatSession {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Scratch value for an assistant reply that is still arriving.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamingMessage {
    pub id: String,
    pub session_id: String,
    pub content: String,
}
