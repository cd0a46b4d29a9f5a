//! Shared HTTP plumbing for the collectors.
//!
//! One `reqwest::Client` is built per collector instance from
//! [`HttpSettings`]. Requests go through [`send_json`] / [`send_text`], which
//! map HTTP status codes onto [`CollectorError`] so the retry loop can tell
//! transient failures from permanent ones.

use std::time::Duration;

use lmi_core::{AppConfig, RetryPolicy};
use reqwest::{Client, RequestBuilder, StatusCode, Url};

use crate::error::CollectorError;

/// Client construction and retry settings shared by every collector.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl HttpSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http_timeout_secs,
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy::new(config.http_max_retries, config.retry_backoff_base_ms),
        }
    }

    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if the TLS backend cannot be initialised.
    pub fn build_client(&self) -> Result<Client, CollectorError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(self.user_agent.clone())
            .build()?)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "lmi/0.1 (+labor-market-intelligence)".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Parses a base URL and normalises it to end with exactly one slash, so
/// that `Url::join` appends paths instead of replacing the last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, CollectorError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| CollectorError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, CollectorError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| CollectorError::InvalidBaseUrl {
            url: format!("{base}{path}"),
            reason: e.to_string(),
        })
}

/// Sends the request and returns the body as text after status checks.
pub(crate) async fn send_text(
    service: &'static str,
    request: RequestBuilder,
) -> Result<String, CollectorError> {
    let response = request.send().await?;
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CollectorError::RateLimited { service });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(CollectorError::Auth {
            service,
            message: format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
        });
    }
    if !status.is_success() {
        return Err(CollectorError::UnexpectedStatus {
            service,
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

/// Sends the request and parses a 2xx body as JSON.
pub(crate) async fn send_json(
    service: &'static str,
    request: RequestBuilder,
) -> Result<serde_json::Value, CollectorError> {
    let body = send_text(service, request).await?;
    serde_json::from_str(&body).map_err(|e| CollectorError::Deserialize {
        context: service.to_string(),
        source: e,
    })
}

/// First 200 characters of a response body, for error messages.
fn snippet(body: &str) -> String {
    lmi_core::truncate_chars(body.trim(), 200)
}
