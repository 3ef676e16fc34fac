use std::collections::HashMap;
use crate::error::Result;
use crate::models::{ClientEvent, Document, DocumentSummary, DocumentUpload, PageMeta, SummaryStatus};
use crate::services::socket_service::SocketClient;
use super::{Feedback, Store};

pub const DOCUMENT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentsState {
    pub documents: Vec<Document>,
    pub meta: Option<PageMeta>,
    pub summaries: HashMap<String, SummaryStatus>,
    pub uploading: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentsAction {
    Pending,
    UploadPending,
    Loaded {
        documents: Vec<Document>,
        meta: Option<PageMeta>,
    },
    Uploaded(Document),
    Deleted(String),
    SummaryLoaded(DocumentSummary),
    SummaryRequested(String),
    SummaryProgress {
        document_id: String,
        progress: u8,
        stage: Option<String>,
    },
    SummaryChunk {
        document_id: String,
        chunk: String,
    },
    SummaryComplete {
        document_id: String,
        summary: String,
    },
    SummaryFailed {
        document_id: String,
        error: String,
    },
    SummaryAborted(String),
    Rejected(String),
}

impl DocumentsState {
    pub fn reduce(&mut self, action: DocumentsAction) {
        match action {
            DocumentsAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            DocumentsAction::UploadPending => {
                self.uploading = true;
                self.error = None;
            }
            DocumentsAction::Loaded { documents, meta } => {
                self.loading = false;
                self.documents = documents;
                self.meta = meta;
            }
            DocumentsAction::Uploaded(document) => {
                self.uploading = false;
                self.documents.retain(|d| d.id != document.id);
                self.documents.insert(0, document);
            }
            DocumentsAction::Deleted(document_id) => {
                self.loading = false;
                self.documents.retain(|d| d.id != document_id);
                self.summaries.remove(&document_id);
            }
            DocumentsAction::SummaryLoaded(summary) => {
                self.loading = false;
                self.complete(summary.document_id, summary.summary);
            }
            DocumentsAction::SummaryRequested(document_id) => {
                self.summaries.insert(
                    document_id,
                    SummaryStatus::InProgress { progress: 0, stage: None },
                );
            }
            DocumentsAction::SummaryProgress { document_id, progress, stage } => {
                let progress = progress.min(100);
                self.summaries
                    .insert(document_id, SummaryStatus::InProgress { progress, stage });
            }
            DocumentsAction::SummaryChunk { document_id, chunk } => {
                let status = self.summaries.entry(document_id).or_default();
                match status {
                    SummaryStatus::Streaming { content } => content.push_str(&chunk),
                    // A finished summary is not reopened by stray chunks.
                    SummaryStatus::Complete { .. } => {}
                    other => *other = SummaryStatus::Streaming { content: chunk },
                }
            }
            DocumentsAction::SummaryComplete { document_id, summary } => {
                self.complete(document_id, summary);
            }
            DocumentsAction::SummaryFailed { document_id, error } => {
                self.summaries.insert(document_id, SummaryStatus::Failed { error });
            }
            DocumentsAction::SummaryAborted(document_id) => {
                self.summaries.insert(document_id, SummaryStatus::Idle);
            }
            DocumentsAction::Rejected(message) => {
                self.loading = false;
                self.uploading = false;
                self.error = Some(message);
            }
        }
    }

    /// Summary state of a document; unknown documents are idle.
    pub fn summary_status(&self, document_id: &str) -> SummaryStatus {
        self.summaries.get(document_id).cloned().unwrap_or_default()
    }

    fn complete(&mut self, document_id: String, summary: String) {
        if let Some(document) = self.documents.iter_mut().find(|d| d.id == document_id) {
            document.summary = Some(summary.clone());
        }
        self.summaries.insert(document_id, SummaryStatus::Complete { summary });
    }
}

impl Store {
    pub async fn fetch_documents(&self, page: u32) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("documents/list/{}", page)) else {
            return Ok(());
        };
        self.run(
            "documents/list",
            Feedback::Read,
            |s| s.documents.reduce(DocumentsAction::Pending),
            async { self.api().get_documents(page, DOCUMENT_PAGE_SIZE).await?.into_page() },
            |s, (documents, meta): &(Vec<Document>, Option<PageMeta>)| {
                s.documents.reduce(DocumentsAction::Loaded {
                    documents: documents.clone(),
                    meta: *meta,
                })
            },
            |s, message| s.documents.reduce(DocumentsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn upload_document(&self, upload: DocumentUpload) -> Result<Document> {
        self.run(
            "documents/upload",
            Feedback::Mutation("Document uploaded"),
            |s| s.documents.reduce(DocumentsAction::UploadPending),
            async { self.api().upload_document(&upload).await?.into_data() },
            |s, document: &Document| s.documents.reduce(DocumentsAction::Uploaded(document.clone())),
            |s, message| s.documents.reduce(DocumentsAction::Rejected(message)),
        )
        .await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.run(
            "documents/delete",
            Feedback::Mutation("Document deleted"),
            |s| s.documents.reduce(DocumentsAction::Pending),
            async { self.api().delete_document(document_id).await?.ensure_success() },
            |s, _: &()| s.documents.reduce(DocumentsAction::Deleted(document_id.to_string())),
            |s, message| s.documents.reduce(DocumentsAction::Rejected(message)),
        )
        .await
    }

    pub async fn fetch_document_summary(&self, document_id: &str) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("documents/summary/{}", document_id)) else {
            return Ok(());
        };
        self.run(
            "documents/summary",
            Feedback::Read,
            |s| s.documents.reduce(DocumentsAction::Pending),
            async {
                let mut summary: DocumentSummary =
                    self.api().get_document_summary(document_id).await?.into_data()?;
                if summary.document_id.is_empty() {
                    summary.document_id = document_id.to_string();
                }
                Ok(summary)
            },
            |s, summary: &DocumentSummary| s.documents.reduce(DocumentsAction::SummaryLoaded(summary.clone())),
            |s, message| s.documents.reduce(DocumentsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    /// Start server-side summarization; progress comes back as socket events.
    pub fn request_summary(&self, socket: &SocketClient, document_id: &str) -> Result<()> {
        socket.emit(&ClientEvent::SummarySubmit {
            document_id: document_id.to_string(),
        })?;
        self.dispatch(|s| s.documents.reduce(DocumentsAction::SummaryRequested(document_id.to_string())));
        Ok(())
    }

    pub fn retry_summary(&self, socket: &SocketClient, document_id: &str) -> Result<()> {
        socket.emit(&ClientEvent::SummaryRetry {
            document_id: document_id.to_string(),
        })?;
        self.dispatch(|s| s.documents.reduce(DocumentsAction::SummaryRequested(document_id.to_string())));
        Ok(())
    }

    pub fn abort_summary(&self, socket: &SocketClient, document_id: &str) -> Result<()> {
        socket.emit(&ClientEvent::SummaryAbort {
            document_id: document_id.to_string(),
        })?;
        self.dispatch(|s| s.documents.reduce(DocumentsAction::SummaryAborted(document_id.to_string())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str) -> Document {
        Document {
            id: id.to_string(),
            title: "Lease".to_string(),
            file_name: "lease.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 1024,
            summary: None,
            uploaded_at: None,
        }
    }

    #[test]
    fn summary_streams_then_completes() {
        let mut state = DocumentsState::default();
        state.reduce(DocumentsAction::Loaded {
            documents: vec![document("d1")],
            meta: None,
        });
        state.reduce(DocumentsAction::SummaryRequested("d1".into()));
        state.reduce(DocumentsAction::SummaryProgress {
            document_id: "d1".into(),
            progress: 40,
            stage: Some("reading".into()),
        });
        state.reduce(DocumentsAction::SummaryChunk { document_id: "d1".into(), chunk: "The ".into() });
        state.reduce(DocumentsAction::SummaryChunk { document_id: "d1".into(), chunk: "tenant".into() });
        assert_eq!(
            state.summary_status("d1"),
            SummaryStatus::Streaming { content: "The tenant".into() }
        );

        state.reduce(DocumentsAction::SummaryComplete {
            document_id: "d1".into(),
            summary: "The tenant pays.".into(),
        });
        state.reduce(DocumentsAction::SummaryChunk { document_id: "d1".into(), chunk: "late".into() });
        assert_eq!(
            state.summary_status("d1"),
            SummaryStatus::Complete { summary: "The tenant pays.".into() }
        );
        assert_eq!(state.documents[0].summary.as_deref(), Some("The tenant pays."));
    }

    #[test]
    fn progress_is_clamped() {
        let mut state = DocumentsState::default();
        state.reduce(DocumentsAction::SummaryProgress {
            document_id: "d1".into(),
            progress: 250,
            stage: None,
        });
        assert_eq!(
            state.summary_status("d1"),
            SummaryStatus::InProgress { progress: 100, stage: None }
        );
    }

    #[test]
    fn unknown_document_summary_is_idle() {
        assert_eq!(DocumentsState::default().summary_status("nope"), SummaryStatus::Idle);
    }

    #[test]
    fn upload_replaces_existing_entry() {
        let mut state = DocumentsState::default();
        state.reduce(DocumentsAction::Loaded {
            documents: vec![document("d1"), document("d2")],
            meta: None,
        });
        state.reduce(DocumentsAction::UploadPending);
        state.reduce(DocumentsAction::Uploaded(document("d2")));
        let ids: Vec<&str> = state.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);
        assert!(!state.uploading);
    }
}
