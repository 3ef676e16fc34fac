use std::sync::Arc;
use std::time::Duration;
use log::{debug, warn};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::error::{ApiError, Result};
use crate::models::{ApiEnvelope, CsrfPayload, RefreshPayload};
use super::config_service::ClientConfig;
use super::session_service::SessionManager;

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const CSRF_PATH: &str = "/auth/csrf-token";

// ============================================================================
// REQUEST DESCRIPTION
// ============================================================================

/// One part of a multipart form.
#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

/// A request kept as plain data so it can be rebuilt, with fresh headers,
/// when it has to be replayed after a session refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Already replayed once (or must never trigger a refresh).
    pub retry: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            retry: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// Mark the request so a 401 is returned as-is instead of refreshing.
    pub fn no_refresh(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// The two preconfigured HTTP clients (JSON and multipart) plus the
/// credential interceptor and 401 recovery.
pub struct HttpClient {
    json: Client,
    multipart: Client,
    base_url: String,
    auto_fetch_csrf: bool,
    /// Held while a CSRF token is being fetched.
    csrf_fetch: tokio::sync::Mutex<()>,
    session: Arc<SessionManager>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionManager>) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        // Both clients share one jar so the refresh cookie travels with every call.
        let jar = Arc::new(Jar::default());

        let mut json_headers = HeaderMap::new();
        json_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        json_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let json = Client::builder()
            .timeout(timeout)
            .cookie_provider(jar.clone())
            .default_headers(json_headers)
            .build()?;

        let multipart = Client::builder()
            .timeout(timeout)
            .cookie_provider(jar)
            .build()?;

        Ok(Self {
            json,
            multipart,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auto_fetch_csrf: config.auto_fetch_csrf,
            csrf_fetch: tokio::sync::Mutex::new(()),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Builds the outgoing request, reading the current bearer and CSRF
    /// tokens at this moment so replays always carry the latest values.
    fn build(&self, request: &ApiRequest) -> Result<RequestBuilder> {
        let client = match request.body {
            RequestBody::Multipart(_) => &self.multipart,
            _ => &self.json,
        };

        let mut builder = client.request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(csrf) = self.session.csrf_token() {
            builder = builder.header(CSRF_HEADER, csrf);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)?),
        };
        Ok(builder)
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<Response> {
        debug!("{} {}{}", request.method, request.path, if request.retry { " (retry)" } else { "" });
        Ok(self.build(request)?.send().await?)
    }

    /// Send a request. A 401 on a first attempt refreshes the session (once,
    /// shared with any concurrent 401s) and replays the request.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response> {
        if request.is_mutating() {
            self.ensure_csrf_token().await;
        }

        let response = self.send_once(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }
        if request.retry {
            // Nothing was replayed: the server's own rejection is the answer.
            debug!("{} {} rejected without refresh", request.method, request.path);
            return check_status(response).await;
        }

        if let Err(e) = self.refresh_session().await {
            warn!("{} {} failed: {}", request.method, request.path, e);
            return Err(ApiError::Unauthorized);
        }

        let mut replay = request;
        replay.retry = true;
        let response = self.send_once(&replay).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        check_status(response).await
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(request).await?;
        decode(response).await
    }

    /// Run (or join) the single in-flight refresh and return the new token.
    pub async fn refresh_session(&self) -> Result<String> {
        self.session.refresh_with(|| self.request_refresh()).await
    }

    async fn request_refresh(&self) -> Result<RefreshPayload> {
        let request = ApiRequest::post(REFRESH_PATH).no_refresh();
        let response = self.send_once(&request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let envelope: ApiEnvelope<RefreshPayload> = decode(check_status(response).await?).await?;
        envelope.into_data_or_default()
    }

    /// Fetch a CSRF token and keep it for every later request.
    pub async fn fetch_csrf_token(&self) -> Result<String> {
        let response = self.send_once(&ApiRequest::get(CSRF_PATH).no_refresh()).await?;
        let envelope: ApiEnvelope<CsrfPayload> = decode(check_status(response).await?).await?;
        let token = envelope
            .into_data_or_default()?
            .csrf_token
            .ok_or_else(|| ApiError::Application("No CSRF token in response".to_string()))?;
        self.session.set_csrf_token(token.clone());
        Ok(token)
    }

    async fn ensure_csrf_token(&self) {
        if !self.auto_fetch_csrf || self.session.csrf_token().is_some() {
            return;
        }
        let _fetching = self.csrf_fetch.lock().await;
        if self.session.csrf_token().is_some() {
            return;
        }
        if let Err(e) = self.fetch_csrf_token().await {
            warn!("Could not fetch CSRF token, sending without it: {}", e);
        }
    }
}

fn build_form(fields: &[FormField]) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name.clone(), value.clone()),
            FormField::File { name, file_name, mime_type, bytes } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime_type)?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
        .ok()
        .map(|envelope| envelope.message)
        .filter(|message| !message.is_empty())
        .unwrap_or(body);
    Err(ApiError::Http {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
