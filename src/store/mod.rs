//! Per-domain state slices and the async operations that fill them.
//!
//! Every slice is a plain struct with a pure `reduce(&mut self, action)`.
//! [`Store`] owns the combined [`RootState`], runs the operations against the
//! typed API, and feeds socket events through the [`reconciler`].

pub mod toast;
pub mod auth;
pub mod chat;
pub mod ai_chat;
pub mod documents;
pub mod consultations;
pub mod credits;
pub mod payments;
pub mod notifications;
pub mod admin;
pub mod reconciler;

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use futures::{Stream, StreamExt};
use log::{debug, warn};
use tokio_stream::wrappers::ReceiverStream;
use crate::error::Result;
use crate::models::ServerEvent;
use crate::services::api_service::Api;
use crate::services::config_service::{get_session_path, ClientConfig};
use crate::services::http_client::HttpClient;
use crate::services::session_service::{SessionEvent, SessionManager};
use crate::services::socket_service::SocketClient;

pub use toast::{Toast, ToastLevel, ToastQueue};

#[derive(Debug, Clone, Default)]
pub struct RootState {
    pub auth: auth::AuthState,
    pub chat: chat::ChatState,
    pub ai_chat: ai_chat::AiChatState,
    pub documents: documents::DocumentsState,
    pub consultations: consultations::ConsultationsState,
    pub credits: credits::CreditsState,
    pub payments: payments::PaymentsState,
    pub notifications: notifications::NotificationsState,
    pub admin: admin::AdminState,
    pub toasts: ToastQueue,
}

impl RootState {
    /// Drop everything tied to the signed-in user, keeping pending toasts.
    pub fn reset_user_data(&mut self) {
        let toasts = std::mem::take(&mut self.toasts);
        *self = RootState {
            toasts,
            ..RootState::default()
        };
    }
}

/// How an operation reports its outcome to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Feedback {
    /// Reads: no success toast; failures set `error` and toast.
    Read,
    /// Mutations: success toast with this text, failure toast with the error.
    Mutation(&'static str),
    /// Background polling: failures are only logged.
    Background,
}

pub struct Store {
    state: Arc<Mutex<RootState>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    api: Api,
}

impl Store {
    pub fn new(api: Api) -> Self {
        let state = Arc::new(Mutex::new(RootState::default()));
        let session = api.http().session().clone();

        {
            let mut root = lock_state(&state);
            let credentials = session.credentials();
            if let Some(token) = credentials.token {
                root.auth.reduce(auth::AuthAction::SessionRestored {
                    token,
                    session_id: credentials.session_id,
                });
            }
        }

        let listener_state = Arc::downgrade(&state);
        session.subscribe(move |event| {
            let Some(state) = listener_state.upgrade() else {
                return;
            };
            let mut root = lock_state(&state);
            match event {
                SessionEvent::Refreshed(credentials) => {
                    if let Some(token) = credentials.token.clone() {
                        root.auth.reduce(auth::AuthAction::TokenRefreshed {
                            token,
                            session_id: credentials.session_id.clone(),
                        });
                    }
                }
                SessionEvent::LoggedOut => {
                    root.reset_user_data();
                    root.auth.reduce(auth::AuthAction::SessionExpired);
                    root.toasts.error("Your session has expired. Please sign in again.");
                }
            }
        });

        Self {
            state,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            api,
        }
    }

    /// Wire up session, HTTP client and API from configuration.
    pub fn from_config(config: &ClientConfig, session: Arc<SessionManager>) -> Result<Self> {
        let http = HttpClient::new(config, session)?;
        Ok(Self::new(Api::new(Arc::new(http))))
    }

    /// Validate `config`, restore the saved session when persistence is on,
    /// and build the store on top.
    pub fn open(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let session = if config.persist_session {
            SessionManager::with_persistence(get_session_path()?)
        } else {
            SessionManager::new()
        };
        Self::from_config(config, Arc::new(session))
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.api.http().session()
    }

    pub fn snapshot(&self) -> RootState {
        lock_state(&self.state).clone()
    }

    pub fn select<R>(&self, selector: impl FnOnce(&RootState) -> R) -> R {
        selector(&lock_state(&self.state))
    }

    pub fn dispatch<R>(&self, reducer: impl FnOnce(&mut RootState) -> R) -> R {
        reducer(&mut lock_state(&self.state))
    }

    pub fn drain_toasts(&self) -> Vec<Toast> {
        self.dispatch(|state| state.toasts.drain())
    }

    // ------------------------------------------------------------------------
    // Real-time events
    // ------------------------------------------------------------------------

    pub fn apply_event(&self, event: ServerEvent) {
        self.dispatch(|state| reconciler::reconcile(state, event));
    }

    /// Open the event socket as the current user.
    pub async fn connect_events(&self, socket_url: &str) -> Result<(SocketClient, ReceiverStream<ServerEvent>)> {
        SocketClient::connect(socket_url, self.session().token()).await
    }

    /// Apply socket events until the stream ends.
    pub async fn run_event_loop<S>(&self, mut events: S)
    where
        S: Stream<Item = ServerEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            self.apply_event(event);
        }
        debug!("Event stream ended");
    }

    // ------------------------------------------------------------------------
    // Operation plumbing
    // ------------------------------------------------------------------------

    /// Claim `key` for a read; `None` if the same read is already running.
    pub(crate) fn begin_request(&self, key: String) -> Option<InFlight> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            debug!("Skipping duplicate request {}", key);
            return None;
        }
        Some(InFlight {
            registry: self.in_flight.clone(),
            key,
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Dispatch `pending`, await `call`, then reduce the outcome and raise the
    /// toast `feedback` asks for. The result is handed back unchanged.
    pub(crate) async fn run<T, Fut>(
        &self,
        name: &str,
        feedback: Feedback,
        pending: impl FnOnce(&mut RootState),
        call: Fut,
        fulfilled: impl FnOnce(&mut RootState, &T),
        rejected: impl FnOnce(&mut RootState, String),
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.dispatch(pending);
        match call.await {
            Ok(value) => {
                debug!("{} fulfilled", name);
                self.dispatch(|state| {
                    fulfilled(state, &value);
                    if let Feedback::Mutation(message) = feedback {
                        state.toasts.success(message);
                    }
                });
                Ok(value)
            }
            Err(e) => {
                warn!("{} rejected: {}", name, e);
                // The logout listener has already reset state and told the user.
                let logged_out = e.is_session_loss() && !self.session().is_authenticated();
                let message = e.user_message();
                self.dispatch(|state| {
                    if feedback == Feedback::Background || logged_out {
                        return;
                    }
                    rejected(state, message.clone());
                    state.toasts.error(message);
                });
                Err(e)
            }
        }
    }
}

/// Releases a de-duplication key when the read finishes.
pub(crate) struct InFlight {
    registry: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn lock_state(state: &Mutex<RootState>) -> MutexGuard<'_, RootState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn reset_keeps_pending_toasts() {
        let mut state = RootState::default();
        state.credits.balance = 10;
        state.toasts.info("Welcome back");
        state.reset_user_data();
        assert_eq!(state.credits.balance, 0);
        assert_eq!(state.toasts.len(), 1);
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = ClientConfig {
            api_base_url: "not a url".to_string(),
            persist_session: false,
            ..ClientConfig::default()
        };
        assert!(matches!(Store::open(&config), Err(ApiError::Config(_))));
    }

    #[test]
    fn restored_session_marks_state_authenticated() {
        let session = Arc::new(SessionManager::new());
        session.set_credentials("abc123".to_string(), Some("sess-1".to_string()));
        let store = Store::from_config(&ClientConfig::default(), session).unwrap();
        let auth = store.select(|s| s.auth.clone());
        assert!(auth.is_authenticated);
        assert_eq!(auth.token.as_deref(), Some("abc123"));
    }

    #[test]
    fn in_flight_key_is_released_on_drop() {
        let store = Store::from_config(&ClientConfig::default(), Arc::new(SessionManager::new())).unwrap();
        let guard = store.begin_request("chat/rooms".to_string());
        assert!(guard.is_some());
        assert!(store.begin_request("chat/rooms".to_string()).is_none());
        drop(guard);
        assert!(!store.is_in_flight("chat/rooms"));
    }
}
