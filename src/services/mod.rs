pub mod config_service;
pub mod session_service;
pub mod http_client;
pub mod api_service;
pub mod socket_service;
