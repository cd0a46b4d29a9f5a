use std::net::SocketAddr;

use crate::sink::SharingMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Client credentials for the Lightcast Open Skills API.
#[derive(Clone)]
pub struct LightcastCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// OAuth installed-app credentials used to mint Google access tokens.
#[derive(Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub http_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub lightcast_request_delay_ms: u64,
    pub default_sharing_mode: SharingMode,
    pub notify_on_share: bool,
    pub serpapi_key: Option<String>,
    pub bls_api_key: Option<String>,
    pub lightcast: Option<LightcastCredentials>,
    pub google: Option<GoogleCredentials>,
    pub google_drive_folder_id: Option<String>,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self.env, Environment::Development)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field(
                "lightcast_request_delay_ms",
                &self.lightcast_request_delay_ms,
            )
            .field("default_sharing_mode", &self.default_sharing_mode)
            .field("notify_on_share", &self.notify_on_share)
            .field("serpapi_key", &self.serpapi_key.as_ref().map(|_| "[redacted]"))
            .field("bls_api_key", &self.bls_api_key.as_ref().map(|_| "[redacted]"))
            .field("lightcast", &self.lightcast.as_ref().map(|_| "[redacted]"))
            .field("google", &self.google.as_ref().map(|_| "[redacted]"))
            .field("google_drive_folder_id", &self.google_drive_folder_id)
            .finish()
    }
}
