mod common;

use std::time::Duration;
use legalhub_client::{ApiError, ApiRequest, SessionEvent};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use common::*;

async fn mount_refresh(server: &MockServer, token: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok(json!({ "token": token, "sessionId": "sess-2" })))
                .set_delay(delay),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({ "_id": "u1", "name": "Ada" }))))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "abc123", Duration::ZERO).await;

    let session = signed_in_session("stale");
    let http = client(&config_for(&server), session.clone());
    let profile: Value = http.execute_json(ApiRequest::get("/auth/profile")).await.unwrap();

    assert_eq!(profile["data"]["name"], "Ada");
    assert_eq!(session.token().as_deref(), Some("abc123"));
    assert_eq!(session.session_id().as_deref(), Some("sess-2"));
    server.verify().await;
}

#[tokio::test]
async fn concurrent_unauthorized_requests_trigger_one_refresh() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([]))))
        .expect(3)
        .mount(&server)
        .await;
    mount_refresh(&server, "fresh", Duration::from_millis(300)).await;

    let http = client(&config_for(&server), signed_in_session("stale"));
    let (a, b, c) = tokio::join!(
        http.execute(ApiRequest::get("/chat/rooms")),
        http.execute(ApiRequest::get("/credits/balance")),
        http.execute(ApiRequest::get("/notifications")),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert!(c.is_ok());
    server.verify().await;
}

#[tokio::test]
async fn second_unauthorized_after_replay_is_not_retried() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, "fresh", Duration::ZERO).await;

    let http = client(&config_for(&server), signed_in_session("stale"));
    let result = http.execute(ApiRequest::get("/documents")).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
    server.verify().await;
}

#[tokio::test]
async fn refresh_without_token_forces_logout() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "message": "" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in_session("stale");
    let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    {
        let events = events.clone();
        session.subscribe(move |event| events.lock().unwrap().push(event.clone()));
    }
    let http = client(&config_for(&server), session.clone());
    let result = http.execute(ApiRequest::get("/auth/profile")).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(!session.is_authenticated());
    assert_eq!(session.token(), None);
    assert_eq!(*events.lock().unwrap(), vec![SessionEvent::LoggedOut]);
    server.verify().await;
}

#[tokio::test]
async fn login_failure_does_not_attempt_refresh() {
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

    let http = client(&config_for(&server), std::sync::Arc::new(legalhub_client::SessionManager::new()));
    let result = http
        .execute(ApiRequest::post("/auth/login").no_refresh())
        .await;

    assert!(matches!(
        result,
        Err(ApiError::Http { status: 401, ref message }) if message == "Invalid credentials"
    ));
    server.verify().await;
}

#[tokio::test]
async fn csrf_token_is_fetched_once_and_attached_to_mutations() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({ "csrfToken": "csrf-1" }))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat/rooms"))
        .and(header("X-CSRF-Token", "csrf-1"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({ "_id": "r1" }))))
        .expect(2)
        .mount(&server)
        .await;

    let config = legalhub_client::ClientConfig {
        auto_fetch_csrf: true,
        ..config_for(&server)
    };
    let http = client(&config, signed_in_session("abc123"));
    for _ in 0..2 {
        let request = ApiRequest::post("/chat/rooms")
            .json(&json!({ "participantId": "u2" }))
            .unwrap();
        http.execute(request).await.unwrap();
    }
    server.verify().await;
}

#[tokio::test]
async fn concurrent_mutations_share_one_csrf_fetch() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok(json!({ "csrfToken": "csrf-1" })))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-CSRF-Token", "csrf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({}))))
        .expect(3)
        .mount(&server)
        .await;

    let config = legalhub_client::ClientConfig {
        auto_fetch_csrf: true,
        ..config_for(&server)
    };
    let http = client(&config, signed_in_session("abc123"));
    let (a, b, c) = tokio::join!(
        http.execute(ApiRequest::post("/chat/rooms")),
        http.execute(ApiRequest::post("/notifications/read-all")),
        http.execute(ApiRequest::post("/credits/purchase")),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert!(c.is_ok());
    server.verify().await;
}

#[tokio::test]
async fn error_status_carries_envelope_message() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/documents/d1"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "success": false, "message": "Document not found" })),
        )
        .mount(&server)
        .await;

    let http = client(&config_for(&server), signed_in_session("abc123"));
    match http.execute(ApiRequest::delete("/documents/d1")).await {
        Err(ApiError::Http { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Document not found");
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.status())),
    }
}
