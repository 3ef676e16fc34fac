use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Every failure the client layer can hand back to a caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 401 that the refresh flow could not (or must not) recover from.
    #[error("unauthorized")]
    Unauthorized,

    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    /// `success: false` inside a 2xx envelope.
    #[error("{0}")]
    Application(String),

    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl ApiError {
    /// Message suitable for a toast or a slice's `error` field.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Application(message) => message.clone(),
            ApiError::Http { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Unauthorized | ApiError::RefreshFailed(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::Transport(_) => "Network error. Please try again.".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::Http { status: 401, .. })
    }

    /// Errors raised when the session itself could not be kept alive.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::RefreshFailed(_))
    }
}
