//! Minimal SerpAPI client shared by the job and trend collectors.

use lmi_core::{retry_with_backoff, RetryPolicy};
use reqwest::{Client, Url};
use serde_json::Value;

use crate::error::CollectorError;
use crate::http::{endpoint, parse_base_url, send_json, HttpSettings};

pub(crate) const SERVICE: &str = "SerpAPI";

pub(crate) struct SerpApiClient {
    client: Client,
    api_key: String,
    search_url: Url,
    retry: RetryPolicy,
}

impl SerpApiClient {
    pub(crate) fn new(
        settings: &HttpSettings,
        api_key: &str,
        base_url: &str,
    ) -> Result<Self, CollectorError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            client: settings.build_client()?,
            api_key: api_key.to_owned(),
            search_url: endpoint(&base, "search")?,
            retry: settings.retry,
        })
    }

    /// Runs one `/search` call with the given engine parameters.
    ///
    /// SerpAPI reports "no results" through the `error` field of a 200
    /// response; that case yields an empty object rather than an error.
    pub(crate) async fn search(&self, params: &[(&str, String)]) -> Result<Value, CollectorError> {
        let body = retry_with_backoff(&self.retry, "serpapi search", || {
            send_json(
                SERVICE,
                self.client
                    .get(self.search_url.clone())
                    .query(params)
                    .query(&[("api_key", self.api_key.as_str())]),
            )
        })
        .await?;

        if let Some(message) = body.get("error").and_then(Value::as_str) {
            if message.contains("hasn't returned any results") {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            return Err(CollectorError::Api {
                service: SERVICE,
                message: message.to_string(),
            });
        }
        Ok(body)
    }
}
