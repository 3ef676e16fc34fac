use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use crate::error::{ApiError, Result};
use crate::models::RefreshPayload;

// ============================================================================
// SESSION DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

type Waiter = oneshot::Sender<Result<String>>;

enum RefreshState {
    Idle,
    /// Callers that hit a 401 while the refresh was already running, oldest first.
    Refreshing { waiters: Vec<Waiter> },
}

struct SessionInner {
    credentials: SessionCredentials,
    csrf_token: Option<String>,
    refresh: RefreshState,
}

/// What listeners registered with [`SessionManager::subscribe`] are told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The coordinator obtained a new token.
    Refreshed(SessionCredentials),
    /// Credentials were dropped because the session could not be recovered.
    LoggedOut,
}

pub type SessionListener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Process-wide session state shared by the HTTP client, the store and the
/// socket: bearer token, CSRF token, and the refresh coordinator.
pub struct SessionManager {
    inner: Mutex<SessionInner>,
    listeners: Mutex<Vec<SessionListener>>,
    store_path: Option<PathBuf>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// In-memory session; nothing survives the process.
    pub fn new() -> Self {
        Self::from_parts(SessionCredentials::default(), None)
    }

    /// Session backed by a JSON file, loaded eagerly.
    pub fn with_persistence(path: PathBuf) -> Self {
        let credentials = load_credentials(&path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable session file {}: {}", path.display(), e);
            SessionCredentials::default()
        });
        Self::from_parts(credentials, Some(path))
    }

    fn from_parts(credentials: SessionCredentials, store_path: Option<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                credentials,
                csrf_token: None,
                refresh: RefreshState::Idle,
            }),
            listeners: Mutex::new(Vec::new()),
            store_path,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------------

    pub fn token(&self) -> Option<String> {
        self.lock().credentials.token.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().credentials.session_id.clone()
    }

    pub fn credentials(&self) -> SessionCredentials {
        self.lock().credentials.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().credentials.token.is_some()
    }

    pub fn set_credentials(&self, token: String, session_id: Option<String>) {
        let snapshot = {
            let mut inner = self.lock();
            inner.credentials.token = Some(token);
            if session_id.is_some() {
                inner.credentials.session_id = session_id;
            }
            inner.credentials.clone()
        };
        self.persist(&snapshot);
    }

    /// Drops token and session id. The CSRF token outlives the session.
    pub fn clear(&self) {
        {
            let mut inner = self.lock();
            inner.credentials = SessionCredentials::default();
        }
        self.persist(&SessionCredentials::default());
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.lock().csrf_token.clone()
    }

    pub fn set_csrf_token(&self, token: String) {
        self.lock().csrf_token = Some(token);
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    fn notify(&self, event: SessionEvent) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&event);
        }
    }

    /// Clears credentials and tells every subscriber the session is gone.
    pub fn force_logout(&self) {
        info!("Forcing logout, session credentials cleared");
        self.clear();
        self.notify(SessionEvent::LoggedOut);
    }

    // ------------------------------------------------------------------------
    // Refresh coordination
    // ------------------------------------------------------------------------

    pub fn refresh_phase(&self) -> RefreshPhase {
        match self.lock().refresh {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
        }
    }

    pub fn pending_waiters(&self) -> usize {
        match &self.lock().refresh {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Obtain a fresh bearer token.
    ///
    /// The first caller while `Idle` runs `refresh`; everyone arriving while
    /// that call is in flight waits for its outcome instead of refreshing
    /// again. On failure all waiters are rejected and the session is logged
    /// out.
    pub async fn refresh_with<F, Fut>(&self, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RefreshPayload>>,
    {
        let waiter = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match &mut inner.refresh {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    debug!("Refresh in flight, queued behind it ({} waiting)", waiters.len());
                    Some(rx)
                }
                RefreshState::Idle => {
                    inner.refresh = RefreshState::Refreshing { waiters: Vec::new() };
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx
                .await
                .unwrap_or_else(|_| Err(ApiError::RefreshFailed("refresh was abandoned".to_string())));
        }

        info!("Access token rejected, refreshing session");
        let guard = RefreshGuard { session: self, settled: false };
        let outcome = refresh().await.and_then(|payload| {
            match payload.token.filter(|token| !token.is_empty()) {
                Some(token) => Ok((token, payload.session_id)),
                None => Err(ApiError::RefreshFailed("no token in refresh response".to_string())),
            }
        });
        guard.settle(outcome)
    }

    fn take_waiters(&self) -> Vec<Waiter> {
        let mut inner = self.lock();
        match std::mem::replace(&mut inner.refresh, RefreshState::Idle) {
            RefreshState::Idle => Vec::new(),
            RefreshState::Refreshing { waiters } => waiters,
        }
    }

    fn persist(&self, credentials: &SessionCredentials) {
        let Some(path) = &self.store_path else {
            return;
        };
        if let Err(e) = save_credentials(path, credentials) {
            warn!("Failed to persist session to {}: {}", path.display(), e);
        }
    }
}

/// Returns the coordinator to `Idle` even if the refreshing future is dropped.
struct RefreshGuard<'a> {
    session: &'a SessionManager,
    settled: bool,
}

impl RefreshGuard<'_> {
    fn settle(mut self, outcome: Result<(String, Option<String>)>) -> Result<String> {
        self.settled = true;
        match outcome {
            Ok((token, session_id)) => {
                self.session.set_credentials(token.clone(), session_id);
                self.session.notify(SessionEvent::Refreshed(self.session.credentials()));
                let waiters = self.session.take_waiters();
                info!("Session refreshed, releasing {} queued request(s)", waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
                Ok(token)
            }
            Err(e) => {
                let reason = match e {
                    ApiError::RefreshFailed(reason) => reason,
                    other => other.to_string(),
                };
                let waiters = self.session.take_waiters();
                warn!("Session refresh failed ({}), rejecting {} queued request(s)", reason, waiters.len());
                // Waiters must wake to a logged-out session.
                self.session.force_logout();
                for waiter in waiters {
                    let _ = waiter.send(Err(ApiError::RefreshFailed(reason.clone())));
                }
                Err(ApiError::RefreshFailed(reason))
            }
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self.session.take_waiters();
            warn!("Session refresh cancelled, dropping {} queued request(s)", abandoned.len());
        }
    }
}

// ============================================================================
// SESSION PERSISTENCE
// ============================================================================

pub fn load_credentials(path: &Path) -> Result<SessionCredentials> {
    if !path.exists() {
        return Ok(SessionCredentials::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_credentials(path: &Path, credentials: &SessionCredentials) -> Result<()> {
    if credentials.token.is_none() && credentials.session_id.is_none() {
        if path.exists() {
            fs::remove_file(path)?;
        }
        return Ok(());
    }
    let content = serde_json::to_string_pretty(credentials)?;
    fs::write(path, content)?;
    Ok(())
}
