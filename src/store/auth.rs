use log::warn;
use crate::error::{ApiError, Result};
use crate::models::{
    AuthPayload, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest, User,
};
use super::{Feedback, Store};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub session_id: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    Pending,
    SignedIn {
        token: String,
        session_id: Option<String>,
        user: Option<User>,
    },
    SessionRestored {
        token: String,
        session_id: Option<String>,
    },
    TokenRefreshed {
        token: String,
        session_id: Option<String>,
    },
    ProfileLoaded(User),
    Succeeded,
    Rejected(String),
    LoggedOut,
    /// The refresh coordinator gave up on the session.
    SessionExpired,
    ClearError,
}

impl AuthState {
    pub fn reduce(&mut self, action: AuthAction) {
        match action {
            AuthAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            AuthAction::SignedIn { token, session_id, user } => {
                self.loading = false;
                self.token = Some(token);
                self.session_id = session_id;
                if user.is_some() {
                    self.user = user;
                }
                self.is_authenticated = true;
            }
            AuthAction::SessionRestored { token, session_id }
            | AuthAction::TokenRefreshed { token, session_id } => {
                self.token = Some(token);
                if session_id.is_some() {
                    self.session_id = session_id;
                }
                self.is_authenticated = true;
            }
            AuthAction::ProfileLoaded(user) => {
                self.loading = false;
                self.user = Some(user);
            }
            AuthAction::Succeeded => self.loading = false,
            AuthAction::Rejected(message) => {
                self.loading = false;
                self.error = Some(message);
            }
            AuthAction::LoggedOut => *self = AuthState::default(),
            AuthAction::SessionExpired => {
                *self = AuthState {
                    error: Some("Session expired".to_string()),
                    ..AuthState::default()
                };
            }
            AuthAction::ClearError => self.error = None,
        }
    }

    pub fn current_user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }
}

impl Store {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let call = async {
            let payload = self.api().login(&body).await?.into_data()?;
            self.adopt_credentials(&payload)?;
            Ok(payload)
        };
        self.run(
            "auth/login",
            Feedback::Mutation("Logged in successfully"),
            |s| s.auth.reduce(AuthAction::Pending),
            call,
            |s, payload: &AuthPayload| s.auth.reduce(signed_in(payload)),
            |s, message| s.auth.reduce(AuthAction::Rejected(message)),
        )
        .await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthPayload> {
        let call = async {
            let payload = self.api().register(&request).await?.into_data()?;
            self.adopt_credentials(&payload)?;
            Ok(payload)
        };
        self.run(
            "auth/register",
            Feedback::Mutation("Account created successfully"),
            |s| s.auth.reduce(AuthAction::Pending),
            call,
            |s, payload: &AuthPayload| s.auth.reduce(signed_in(payload)),
            |s, message| s.auth.reduce(AuthAction::Rejected(message)),
        )
        .await
    }

    fn adopt_credentials(&self, payload: &AuthPayload) -> Result<()> {
        let token = payload
            .token
            .clone()
            .ok_or_else(|| ApiError::Application("No token in response".to_string()))?;
        self.session().set_credentials(token, payload.session_id.clone());
        Ok(())
    }

    /// Server logout is best-effort; local credentials are always dropped.
    pub async fn logout(&self) {
        if let Err(e) = self.api().logout().await {
            warn!("Server logout failed, clearing local session anyway: {}", e);
        }
        self.session().clear();
        self.dispatch(|s| {
            s.reset_user_data();
            s.auth.reduce(AuthAction::LoggedOut);
            s.toasts.success("Logged out");
        });
    }

    pub async fn fetch_profile(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("auth/profile".to_string()) else {
            return Ok(());
        };
        self.run(
            "auth/profile",
            Feedback::Read,
            |s| s.auth.reduce(AuthAction::Pending),
            async { self.api().get_profile().await?.into_data() },
            |s, user: &User| s.auth.reduce(AuthAction::ProfileLoaded(user.clone())),
            |s, message| s.auth.reduce(AuthAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<User> {
        self.run(
            "auth/update-profile",
            Feedback::Mutation("Profile updated"),
            |s| s.auth.reduce(AuthAction::Pending),
            async { self.api().update_profile(&request).await?.into_data() },
            |s, user: &User| s.auth.reduce(AuthAction::ProfileLoaded(user.clone())),
            |s, message| s.auth.reduce(AuthAction::Rejected(message)),
        )
        .await
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let request = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.run(
            "auth/change-password",
            Feedback::Mutation("Password changed"),
            |s| s.auth.reduce(AuthAction::Pending),
            async { self.api().change_password(&request).await?.ensure_success() },
            |s, _: &()| s.auth.reduce(AuthAction::Succeeded),
            |s, message| s.auth.reduce(AuthAction::Rejected(message)),
        )
        .await
    }

    /// Explicit refresh through the shared coordinator.
    pub async fn refresh_session(&self) -> Result<String> {
        self.api().refresh_token().await
    }
}

fn signed_in(payload: &AuthPayload) -> AuthAction {
    AuthAction::SignedIn {
        token: payload.token.clone().unwrap_or_default(),
        session_id: payload.session_id.clone(),
        user: payload.user.clone(),
    }
}
