mod common;

use std::time::Duration;
use legalhub_client::models::{DocumentUpload, UserRole};
use legalhub_client::store::ToastLevel;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use common::*;

#[tokio::test]
async fn login_stores_credentials_in_session_and_state() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({ "email": "ada@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
            "token": "abc123",
            "sessionId": "sess-1",
            "user": { "_id": "u1", "name": "Ada", "role": "client" }
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let session = std::sync::Arc::new(legalhub_client::SessionManager::new());
    let store = store(&config_for(&server), session.clone());
    store.login("ada@example.com", "secret").await.unwrap();

    let state = store.snapshot();
    assert!(state.auth.is_authenticated);
    assert_eq!(state.auth.current_user_id(), Some("u1"));
    assert_eq!(state.auth.user.as_ref().map(|u| u.role), Some(UserRole::Client));
    assert_eq!(session.token().as_deref(), Some("abc123"));
    let toasts = store.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Success);
}

#[tokio::test]
async fn rejected_login_shows_server_message() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "success": false, "message": "Invalid credentials" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store(&config_for(&server), std::sync::Arc::new(legalhub_client::SessionManager::new()));
    assert!(store.login("ada@example.com", "wrong").await.is_err());

    let state = store.snapshot();
    assert!(!state.auth.is_authenticated);
    assert_eq!(state.auth.error.as_deref(), Some("Invalid credentials"));
    let toasts = store.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert_eq!(toasts[0].message, "Invalid credentials");
    server.verify().await;
}

#[tokio::test]
async fn application_error_sets_error_and_toasts() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/credits/balance"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": false, "message": "Account suspended" })),
        )
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    let result = store.fetch_credit_balance().await;

    assert!(result.is_err());
    let state = store.snapshot();
    assert_eq!(state.credits.error.as_deref(), Some("Account suspended"));
    assert!(!state.credits.loading);
    let toasts = store.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert_eq!(toasts[0].message, "Account suspended");
}

#[tokio::test]
async fn duplicate_reads_issue_one_request() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/rooms"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok(json!([{ "_id": "r1", "unreadCount": 2 }])))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    let (first, second) = tokio::join!(store.fetch_rooms(), store.fetch_rooms());

    assert!(first.is_ok());
    assert!(second.is_ok());
    let state = store.snapshot();
    assert_eq!(state.chat.rooms.len(), 1);
    assert_eq!(state.chat.unread_count("r1"), 2);
    assert!(!store.is_in_flight("chat/rooms"));
    server.verify().await;
}

#[tokio::test]
async fn failed_refresh_resets_the_whole_state_tree() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/consultations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session("stale");
    let store = store(&config_for(&server), session.clone());
    assert!(store.snapshot().auth.is_authenticated);

    let result = store.fetch_consultations(None).await;

    assert!(result.is_err());
    let state = store.snapshot();
    assert!(!state.auth.is_authenticated);
    assert_eq!(state.auth.token, None);
    assert!(state.consultations.consultations.is_empty());
    assert!(!session.is_authenticated());
    assert!(store
        .drain_toasts()
        .iter()
        .any(|t| t.level == ToastLevel::Error && t.message.contains("session has expired")));
    server.verify().await;
}

#[tokio::test]
async fn forced_logout_is_reported_once() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "message": "" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("stale"));
    let (rooms, profile, sessions) = tokio::join!(
        store.fetch_rooms(),
        store.fetch_profile(),
        store.fetch_ai_sessions(),
    );

    assert!(rooms.is_err());
    assert!(profile.is_err());
    assert!(sessions.is_err());
    let state = store.snapshot();
    assert!(!state.auth.is_authenticated);
    assert_eq!(state.chat.error, None);
    assert!(!state.chat.loading);
    let toasts = store.drain_toasts();
    assert_eq!(toasts.len(), 1, "got {:?}", toasts);
    assert!(toasts[0].message.contains("session has expired"));
    server.verify().await;
}

#[tokio::test]
async fn logout_clears_session_even_when_server_fails() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session("abc123");
    let store = store(&config_for(&server), session.clone());
    store.logout().await;

    assert!(!session.is_authenticated());
    assert!(!store.snapshot().auth.is_authenticated);
    server.verify().await;
}

#[tokio::test]
async fn optimistic_message_is_replaced_by_server_copy() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/rooms/r1/messages"))
        .and(body_partial_json(json!({ "content": "Hello counsel" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
            "_id": "m1",
            "roomId": "r1",
            "senderId": "u1",
            "content": "Hello counsel"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    let message = store.send_message("r1", "Hello counsel").await.unwrap();

    assert_eq!(message.id, "m1");
    let state = store.snapshot();
    let messages = state.chat.room_messages("r1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m1");
    assert!(!messages[0].pending);
    assert!(!state.chat.sending);
}

#[tokio::test]
async fn failed_send_drops_optimistic_copy() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/rooms/r1/messages"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "success": false, "message": "Not a participant" })),
        )
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    assert!(store.send_message("r1", "hi").await.is_err());

    let state = store.snapshot();
    assert!(state.chat.room_messages("r1").is_empty());
    assert_eq!(state.chat.error.as_deref(), Some("Not a participant"));
}

#[tokio::test]
async fn unread_poll_failure_is_silent() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/unread-count"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    assert!(store.poll_unread_counts().await.is_err());

    let state = store.snapshot();
    assert_eq!(state.chat.error, None);
    assert!(state.toasts.is_empty());
}

#[tokio::test]
async fn second_page_of_messages_is_prepended() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/rooms/r1/messages"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "",
            "data": [{ "_id": "m3", "roomId": "r1", "senderId": "u2" }],
            "meta": { "currentPage": 1, "limit": 50, "totalCount": 3, "totalPages": 2 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat/rooms/r1/messages"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
            { "_id": "m1", "roomId": "r1", "senderId": "u2" },
            { "_id": "m2", "roomId": "r1", "senderId": "u2" }
        ]))))
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    store.fetch_messages("r1", 1).await.unwrap();
    assert!(store.select(|s| s.chat.pagination["r1"].has_more()));
    store.fetch_messages("r1", 2).await.unwrap();

    let ids: Vec<String> = store.select(|s| s.chat.room_messages("r1").iter().map(|m| m.id.clone()).collect());
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn payment_verification_reloads_balance() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/verify"))
        .and(body_partial_json(json!({ "sessionId": "cs_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
            "_id": "p1",
            "amountCents": 1999,
            "currency": "usd",
            "status": "succeeded"
        }))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/credits/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({ "balance": 120 }))))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    store.verify_payment("cs_1").await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.credits.balance, 120);
    assert_eq!(state.payments.history.len(), 1);
    server.verify().await;
}

#[tokio::test]
async fn document_upload_goes_out_as_multipart() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
            "_id": "d1",
            "title": "Lease",
            "fileName": "lease.pdf"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&config_for(&server), signed_in_session("abc123"));
    let upload = DocumentUpload {
        title: "Lease".to_string(),
        file_name: "lease.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4".to_vec(),
    };
    store.upload_document(upload).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"), "got {}", content_type);
    assert_eq!(store.snapshot().documents.documents[0].id, "d1");
}
