#![allow(dead_code)]

use std::sync::Arc;
use legalhub_client::{Api, ClientConfig, HttpClient, SessionManager, Store};
use serde_json::{json, Value};
use wiremock::MockServer;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        auto_fetch_csrf: false,
        persist_session: false,
        ..ClientConfig::with_base_url(&format!("{}/api", server.uri()))
    }
}

pub fn signed_in_session(token: &str) -> Arc<SessionManager> {
    let session = Arc::new(SessionManager::new());
    session.set_credentials(token.to_string(), Some("sess-1".to_string()));
    session
}

pub fn client(config: &ClientConfig, session: Arc<SessionManager>) -> Arc<HttpClient> {
    Arc::new(HttpClient::new(config, session).unwrap())
}

pub fn store(config: &ClientConfig, session: Arc<SessionManager>) -> Store {
    Store::new(Api::new(client(config, session)))
}

pub fn ok(data: Value) -> Value {
    json!({ "success": true, "message": "ok", "data": data })
}
