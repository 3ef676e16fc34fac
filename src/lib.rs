pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::{ApiError, Result};
pub use services::api_service::Api;
pub use services::config_service::{get_effective_config, ClientConfig};
pub use services::http_client::{ApiRequest, HttpClient};
pub use services::session_service::{SessionCredentials, SessionEvent, SessionManager};
pub use services::socket_service::SocketClient;
pub use store::{RootState, Store};
