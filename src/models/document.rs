use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// File plus metadata for a multipart upload.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub summary: String,
}

/// Progress of a server-side summarization job.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SummaryStatus {
    #[default]
    Idle,
    InProgress { progress: u8, stage: Option<String> },
    Streaming { content: String },
    Complete { summary: String },
    Failed { error: String },
}
