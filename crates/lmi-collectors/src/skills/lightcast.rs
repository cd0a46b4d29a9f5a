//! Lightcast Open Skills API client.
//!
//! Authenticates with the OAuth client-credentials flow and caches the
//! bearer token per client instance. A 401 from the API drops the cached
//! token and the request is retried once with a fresh one.

use lmi_core::{retry_with_backoff, AccessToken, LightcastCredentials, RetryPolicy, TokenCache};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollectorError;
use crate::http::{endpoint, parse_base_url, send_json, HttpSettings};

const SERVICE: &str = "Lightcast";
const SCOPE: &str = "emsi_open";

pub(super) struct LightcastClient {
    client: Client,
    credentials: LightcastCredentials,
    token_url: Url,
    skills_url: Url,
    related_url: Url,
    tokens: TokenCache,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SkillsResponse {
    #[serde(default)]
    data: Vec<SkillRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SkillRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    skill_type: Option<Named>,
    #[serde(default)]
    category: Option<Named>,
    #[serde(default)]
    subcategory: Option<Named>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct RelatedRequest<'a> {
    ids: &'a [String],
    limit: usize,
}

/// A taxonomy entry as returned by the search and related endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LightcastSkill {
    pub id: String,
    pub name: String,
    pub skill_type: String,
    pub category: String,
    pub subcategory: String,
    pub description: String,
}

fn name_of(named: Option<Named>) -> String {
    named.map(|n| n.name).unwrap_or_default()
}

impl From<SkillRecord> for LightcastSkill {
    fn from(record: SkillRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            skill_type: name_of(record.skill_type),
            category: name_of(record.category),
            subcategory: name_of(record.subcategory),
            description: record.description.unwrap_or_default(),
        }
    }
}

fn parse_skills(body: Value, context: &str) -> Result<Vec<LightcastSkill>, CollectorError> {
    let response: SkillsResponse =
        serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
            context: context.to_string(),
            source: e,
        })?;
    Ok(response.data.into_iter().map(LightcastSkill::from).collect())
}

impl LightcastClient {
    pub(super) fn new(
        settings: &HttpSettings,
        credentials: LightcastCredentials,
        auth_base: &str,
        api_base: &str,
    ) -> Result<Self, CollectorError> {
        let auth = parse_base_url(auth_base)?;
        let api = parse_base_url(api_base)?;
        Ok(Self {
            client: settings.build_client()?,
            credentials,
            token_url: endpoint(&auth, "connect/token")?,
            skills_url: endpoint(&api, "skills/versions/latest/skills")?,
            related_url: endpoint(&api, "skills/versions/latest/related")?,
            tokens: TokenCache::new(),
            retry: settings.retry,
        })
    }

    /// Returns a valid bearer token, fetching one if the cache is stale.
    pub(super) async fn token(&self) -> Result<String, CollectorError> {
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    async fn fetch_token(&self) -> Result<AccessToken, CollectorError> {
        tracing::debug!("requesting lightcast access token");
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", SCOPE),
        ];
        let body = retry_with_backoff(&self.retry, "lightcast token", || {
            send_json(SERVICE, self.client.post(self.token_url.clone()).form(&form))
        })
        .await?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
                context: "lightcast token response".to_string(),
                source: e,
            })?;
        Ok(AccessToken::expiring_in(token.access_token, token.expires_in))
    }

    /// Sends an authorized request, refreshing the token once on 401.
    async fn authorized<F>(&self, label: &str, build: F) -> Result<Value, CollectorError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let mut refreshed = false;
        loop {
            let token = self.token().await?;
            let result = retry_with_backoff(&self.retry, label, || {
                send_json(SERVICE, build(&token))
            })
            .await;
            match result {
                Err(CollectorError::Auth { .. }) if !refreshed => {
                    tracing::info!(operation = label, "lightcast token rejected; refreshing");
                    self.tokens.invalidate().await;
                    refreshed = true;
                }
                other => return other,
            }
        }
    }

    /// Best taxonomy match for a free-text skill, if any.
    pub(super) async fn find_skill(
        &self,
        query: &str,
    ) -> Result<Option<LightcastSkill>, CollectorError> {
        let body = self
            .authorized("lightcast skill search", |token| {
                self.client
                    .get(self.skills_url.clone())
                    .query(&[("q", query), ("limit", "1")])
                    .bearer_auth(token)
            })
            .await?;
        Ok(parse_skills(body, "lightcast skill search")?
            .into_iter()
            .next())
    }

    /// Skills frequently found alongside `ids`.
    pub(super) async fn related_skills(
        &self,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<LightcastSkill>, CollectorError> {
        let request = RelatedRequest { ids, limit };
        let body = self
            .authorized("lightcast related skills", |token| {
                self.client
                    .post(self.related_url.clone())
                    .json(&request)
                    .bearer_auth(token)
            })
            .await?;
        parse_skills(body, "lightcast related skills")
    }
}
