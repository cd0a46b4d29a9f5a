use lmi_core::Retriable;
use thiserror::Error;

/// Errors raised inside a collector while talking to its upstream service.
///
/// These never leave a collector's `execute`; they are rendered into the
/// module result's `errors` or `warnings`.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rate limit exceeded (HTTP 429)")]
    RateLimited { service: &'static str },

    #[error("{service} returned HTTP {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    /// The service answered 2xx but reported an application-level error.
    #[error("{service} API error: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the credentials: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl Retriable for CollectorError {
    /// Transport failures, 429 and 5xx are worth another attempt. Auth,
    /// application and parse errors are not.
    fn is_retriable(&self) -> bool {
        match self {
            CollectorError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            CollectorError::RateLimited { .. } => true,
            CollectorError::UnexpectedStatus { status, .. } => *status >= 500,
            CollectorError::Api { .. }
            | CollectorError::Auth { .. }
            | CollectorError::Deserialize { .. }
            | CollectorError::NotConfigured(_)
            | CollectorError::InvalidBaseUrl { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_and_server_errors_are_retriable() {
        assert!(CollectorError::RateLimited { service: "SerpAPI" }.is_retriable());
        assert!(CollectorError::UnexpectedStatus {
            service: "BLS",
            status: 503
        }
        .is_retriable());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!CollectorError::UnexpectedStatus {
            service: "BLS",
            status: 404
        }
        .is_retriable());
        assert!(!CollectorError::Auth {
            service: "Lightcast",
            message: "invalid_client".to_string()
        }
        .is_retriable());
        assert!(!CollectorError::Api {
            service: "SerpAPI",
            message: "Invalid API key".to_string()
        }
        .is_retriable());
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        let source = serde_json::from_str::<()>("invalid").unwrap_err();
        assert!(!CollectorError::Deserialize {
            context: "test".to_string(),
            source
        }
        .is_retriable());
    }
}
