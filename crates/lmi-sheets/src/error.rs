use lmi_core::Retriable;
use thiserror::Error;

/// Errors from the Google Sheets and Drive APIs.
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API rate limit exceeded (HTTP 429)")]
    RateLimited,

    /// Non-2xx response with the API's error message, if it sent one.
    #[error("Google API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Google OAuth token refresh failed: {0}")]
    Auth(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl Retriable for SheetsError {
    fn is_retriable(&self) -> bool {
        match self {
            SheetsError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            SheetsError::RateLimited => true,
            SheetsError::Api { status, .. } => *status >= 500,
            SheetsError::Auth(_)
            | SheetsError::Deserialize { .. }
            | SheetsError::InvalidBaseUrl { .. } => false,
        }
    }
}
