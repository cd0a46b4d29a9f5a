//! Bearer-token cache with single-flight refresh.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Used when a token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest lifetime honoured, whatever the endpoint reports.
const MAX_EXPIRES_IN_SECS: i64 = 30 * 24 * 3600;

#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// A token valid for `expires_in_secs`, clamped to `0..=30 days`.
    #[must_use]
    pub fn expiring_in(value: String, expires_in_secs: Option<i64>) -> Self {
        let secs = expires_in_secs
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .clamp(0, MAX_EXPIRES_IN_SECS);
        let now = Utc::now();
        let expires_at = Duration::try_seconds(secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(now);
        Self { value, expires_at }
    }

    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        Duration::try_seconds(REFRESH_MARGIN_SECS)
            .and_then(|margin| self.expires_at.checked_sub_signed(margin))
            .is_some_and(|refresh_at| refresh_at > now)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds one token per client instance.
///
/// The lock is held across the refresh, so concurrent callers that find the
/// token stale wait for a single fetch instead of racing.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, calling `fetch` first if it is missing or stale.
    ///
    /// # Errors
    ///
    /// Propagates the error from `fetch`; the cache is left empty.
    pub async fn get_or_refresh<F, Fut, E>(&self, fetch: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh_at(Utc::now())) {
            return Ok(token.value.clone());
        }
        *slot = None;
        let token = fetch().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    /// Drops the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
