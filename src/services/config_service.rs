use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{ApiError, Result};

const APP_DIR_NAME: &str = "LegalHub";
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000/ws";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_URL_ENV: &str = "LEGALHUB_API_URL";
pub const SOCKET_URL_ENV: &str = "LEGALHUB_SOCKET_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Fetch a CSRF token before the first mutating request.
    #[serde(default = "default_true")]
    pub auto_fetch_csrf: bool,
    /// Keep the session token in `session.json` between runs.
    #[serde(default = "default_true")]
    pub persist_session: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_socket_url() -> String {
    DEFAULT_SOCKET_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            socket_url: default_socket_url(),
            request_timeout_secs: default_timeout_secs(),
            auto_fetch_csrf: true,
            persist_session: true,
        }
    }
}

impl ClientConfig {
    /// Config pointed at a specific backend, everything else defaulted.
    pub fn with_base_url(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base_url)
            .map_err(|e| ApiError::Config(format!("api base url {}: {}", self.api_base_url, e)))?;
        url::Url::parse(&self.socket_url)
            .map_err(|e| ApiError::Config(format!("socket url {}: {}", self.socket_url, e)))?;
        if self.request_timeout_secs == 0 {
            return Err(ApiError::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }
}

pub fn get_app_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ApiError::Config("Could not find data directory".to_string()))?
        .join(APP_DIR_NAME);

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

fn get_config_path() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn get_session_path() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join("session.json"))
}

pub fn load_config() -> Result<ClientConfig> {
    load_config_from(&get_config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_config(config: &ClientConfig) -> Result<()> {
    save_config_to(&get_config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn set_api_base_url(url: &str) -> Result<()> {
    let mut config = load_config().unwrap_or_default();
    config.api_base_url = url.trim_end_matches('/').to_string();
    save_config(&config)
}

pub fn set_socket_url(url: &str) -> Result<()> {
    let mut config = load_config().unwrap_or_default();
    config.socket_url = url.to_string();
    save_config(&config)
}

/// Overlay values from `lookup` (normally the process environment).
pub fn apply_overrides<F>(mut config: ClientConfig, lookup: F) -> ClientConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(url) = lookup(SOCKET_URL_ENV).filter(|v| !v.is_empty()) {
        config.socket_url = url;
    }
    config
}

/// Stored config with environment overrides applied, validated.
pub fn get_effective_config() -> Result<ClientConfig> {
    let config = apply_overrides(load_config()?, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
