use std::collections::HashMap;
use std::sync::Arc;
use urlencoding::encode;
use crate::error::Result;
use crate::models::*;
use super::http_client::{ApiRequest, FormField, HttpClient};

/// One method per backend endpoint. Envelopes are returned untouched; callers
/// decide what `success: false` means for them.
#[derive(Clone)]
pub struct Api {
    http: Arc<HttpClient>,
}

impl Api {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, request: ApiRequest) -> Result<ApiEnvelope<T>> {
        self.http.execute_json(request).await
    }

    // ========================================================================
    // AUTH
    // ========================================================================

    pub async fn csrf_token(&self) -> Result<String> {
        self.http.fetch_csrf_token().await
    }

    pub async fn login(&self, body: &LoginRequest) -> Result<ApiEnvelope<AuthPayload>> {
        self.call(ApiRequest::post("/auth/login").no_refresh().json(body)?).await
    }

    pub async fn register(&self, body: &RegisterRequest) -> Result<ApiEnvelope<AuthPayload>> {
        self.call(ApiRequest::post("/auth/register").no_refresh().json(body)?).await
    }

    pub async fn logout(&self) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(ApiRequest::post("/auth/logout").no_refresh()).await
    }

    /// Goes through the shared refresh coordinator.
    pub async fn refresh_token(&self) -> Result<String> {
        self.http.refresh_session().await
    }

    pub async fn get_profile(&self) -> Result<ApiEnvelope<User>> {
        self.call(ApiRequest::get("/auth/profile")).await
    }

    pub async fn update_profile(&self, body: &UpdateProfileRequest) -> Result<ApiEnvelope<User>> {
        self.call(ApiRequest::put("/auth/profile").json(body)?).await
    }

    pub async fn change_password(&self, body: &ChangePasswordRequest) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(ApiRequest::put("/auth/change-password").json(body)?).await
    }

    // ========================================================================
    // CHAT ROOMS
    // ========================================================================

    pub async fn get_user_chat_rooms(&self) -> Result<ApiEnvelope<Vec<ChatRoom>>> {
        self.call(ApiRequest::get("/chat/rooms")).await
    }

    pub async fn create_chat_room(&self, body: &CreateRoomRequest) -> Result<ApiEnvelope<ChatRoom>> {
        self.call(ApiRequest::post("/chat/rooms").json(body)?).await
    }

    pub async fn get_room_messages(&self, room_id: &str, page: u32, limit: u32) -> Result<ApiEnvelope<Vec<ChatMessage>>> {
        let path = format!("/chat/rooms/{}/messages", encode(room_id));
        self.call(ApiRequest::get(path).query("page", page).query("limit", limit)).await
    }

    pub async fn send_room_message(&self, room_id: &str, body: &SendMessageRequest) -> Result<ApiEnvelope<ChatMessage>> {
        let path = format!("/chat/rooms/{}/messages", encode(room_id));
        self.call(ApiRequest::post(path).json(body)?).await
    }

    pub async fn mark_room_read(&self, room_id: &str) -> Result<ApiEnvelope<serde_json::Value>> {
        let path = format!("/chat/rooms/{}/read", encode(room_id));
        self.call(ApiRequest::put(path)).await
    }

    pub async fn get_unread_counts(&self) -> Result<ApiEnvelope<Vec<UnreadCount>>> {
        self.call(ApiRequest::get("/chat/unread-count")).await
    }

    // ========================================================================
    // AI CHAT
    // ========================================================================

    pub async fn get_ai_sessions(&self) -> Result<ApiEnvelope<Vec<AiChatSession>>> {
        self.call(ApiRequest::get("/ai-chat/sessions")).await
    }

    pub async fn get_ai_session_messages(&self, session_id: &str) -> Result<ApiEnvelope<Vec<AiMessage>>> {
        let path = format!("/ai-chat/sessions/{}/messages", encode(session_id));
        self.call(ApiRequest::get(path)).await
    }

    pub async fn delete_ai_session(&self, session_id: &str) -> Result<ApiEnvelope<serde_json::Value>> {
        let path = format!("/ai-chat/sessions/{}", encode(session_id));
        self.call(ApiRequest::delete(path)).await
    }

    // ========================================================================
    // DOCUMENTS
    // ========================================================================

    pub async fn get_documents(&self, page: u32, limit: u32) -> Result<ApiEnvelope<Vec<Document>>> {
        self.call(ApiRequest::get("/documents").query("page", page).query("limit", limit)).await
    }

    pub async fn upload_document(&self, upload: &DocumentUpload) -> Result<ApiEnvelope<Document>> {
        let fields = vec![
            FormField::Text {
                name: "title".to_string(),
                value: upload.title.clone(),
            },
            FormField::File {
                name: "file".to_string(),
                file_name: upload.file_name.clone(),
                mime_type: upload.mime_type.clone(),
                bytes: upload.bytes.clone(),
            },
        ];
        self.call(ApiRequest::post("/documents/upload").multipart(fields)).await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<ApiEnvelope<serde_json::Value>> {
        let path = format!("/documents/{}", encode(document_id));
        self.call(ApiRequest::delete(path)).await
    }

    pub async fn get_document_summary(&self, document_id: &str) -> Result<ApiEnvelope<DocumentSummary>> {
        let path = format!("/documents/{}/summary", encode(document_id));
        self.call(ApiRequest::get(path)).await
    }

    // ========================================================================
    // CONSULTATIONS
    // ========================================================================

    pub async fn get_consultations(&self, status: Option<ConsultationStatus>) -> Result<ApiEnvelope<Vec<Consultation>>> {
        let mut request = ApiRequest::get("/consultations");
        if let Some(status) = status {
            request = request.query("status", wire_name(&status)?);
        }
        self.call(request).await
    }

    pub async fn book_consultation(&self, body: &BookConsultationRequest) -> Result<ApiEnvelope<Consultation>> {
        self.call(ApiRequest::post("/consultations").json(body)?).await
    }

    pub async fn cancel_consultation(&self, consultation_id: &str) -> Result<ApiEnvelope<Consultation>> {
        let path = format!("/consultations/{}/cancel", encode(consultation_id));
        self.call(ApiRequest::put(path)).await
    }

    pub async fn update_consultation_status(
        &self,
        consultation_id: &str,
        body: &UpdateConsultationStatusRequest,
    ) -> Result<ApiEnvelope<Consultation>> {
        let path = format!("/consultations/{}/status", encode(consultation_id));
        self.call(ApiRequest::patch(path).json(body)?).await
    }

    // ========================================================================
    // CREDITS
    // ========================================================================

    pub async fn get_credit_balance(&self) -> Result<ApiEnvelope<CreditBalance>> {
        self.call(ApiRequest::get("/credits/balance")).await
    }

    pub async fn get_credit_packages(&self) -> Result<ApiEnvelope<Vec<CreditPackage>>> {
        self.call(ApiRequest::get("/credits/packages")).await
    }

    pub async fn get_credit_transactions(&self, page: u32, limit: u32) -> Result<ApiEnvelope<Vec<CreditTransaction>>> {
        self.call(ApiRequest::get("/credits/transactions").query("page", page).query("limit", limit)).await
    }

    // ========================================================================
    // PAYMENTS
    // ========================================================================

    pub async fn create_checkout_session(&self, body: &CheckoutRequest) -> Result<ApiEnvelope<CheckoutSession>> {
        self.call(ApiRequest::post("/payments/checkout").json(body)?).await
    }

    pub async fn verify_payment(&self, body: &VerifyPaymentRequest) -> Result<ApiEnvelope<Payment>> {
        self.call(ApiRequest::post("/payments/verify").json(body)?).await
    }

    pub async fn get_payment_history(&self, page: u32, limit: u32) -> Result<ApiEnvelope<Vec<Payment>>> {
        self.call(ApiRequest::get("/payments/history").query("page", page).query("limit", limit)).await
    }

    // ========================================================================
    // NOTIFICATIONS
    // ========================================================================

    pub async fn get_notifications(&self, page: u32, limit: u32) -> Result<ApiEnvelope<Vec<Notification>>> {
        self.call(ApiRequest::get("/notifications").query("page", page).query("limit", limit)).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<ApiEnvelope<Notification>> {
        let path = format!("/notifications/{}/read", encode(notification_id));
        self.call(ApiRequest::put(path)).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<ApiEnvelope<serde_json::Value>> {
        self.call(ApiRequest::put("/notifications/read-all")).await
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    pub async fn get_users(&self, role: Option<UserRole>, page: u32, limit: u32) -> Result<ApiEnvelope<Vec<User>>> {
        let mut request = ApiRequest::get("/admin/users").query("page", page).query("limit", limit);
        if let Some(role) = role {
            request = request.query("role", wire_name(&role)?);
        }
        self.call(request).await
    }

    pub async fn update_user_status(&self, user_id: &str, body: &UpdateUserStatusRequest) -> Result<ApiEnvelope<User>> {
        let path = format!("/admin/users/{}/status", encode(user_id));
        self.call(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn get_pending_lawyers(&self) -> Result<ApiEnvelope<Vec<User>>> {
        self.call(ApiRequest::get("/admin/lawyers/pending")).await
    }

    pub async fn verify_lawyer(&self, lawyer_id: &str, body: &VerifyLawyerRequest) -> Result<ApiEnvelope<User>> {
        let path = format!("/admin/lawyers/{}/verify", encode(lawyer_id));
        self.call(ApiRequest::patch(path).json(body)?).await
    }
}

/// Wire spelling of a serde-renamed enum, for query strings.
fn wire_name<T: serde::Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

/// Unread counts keyed by room.
pub fn unread_map(counts: Vec<UnreadCount>) -> HashMap<String, u32> {
    counts.into_iter().map(|c| (c.room_id, c.count)).collect()
}
