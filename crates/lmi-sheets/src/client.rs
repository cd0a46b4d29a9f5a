//! Thin client for the Google Sheets v4 and Drive v3 REST APIs.
//!
//! Authenticates with a long-lived OAuth refresh token; access tokens are
//! cached per client in a [`TokenCache`].

use std::time::Duration;

use lmi_core::{retry_with_backoff, AccessToken, GoogleCredentials, RetryPolicy, TokenCache};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SheetsError;

/// Base URLs of the Google services the sink talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub oauth: String,
    pub sheets: String,
    pub drive: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            oauth: "https://oauth2.googleapis.com".to_string(),
            sheets: "https://sheets.googleapis.com".to_string(),
            drive: "https://www.googleapis.com".to_string(),
        }
    }
}

impl GoogleEndpoints {
    #[must_use]
    pub fn all(base_url: &str) -> Self {
        Self {
            oauth: base_url.to_string(),
            sheets: base_url.to_string(),
            drive: base_url.to_string(),
        }
    }
}

/// A spreadsheet as returned by the create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spreadsheet {
    pub id: String,
    pub url: String,
    /// Id of the tab Sheets creates by default.
    pub first_sheet_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    spreadsheet_id: String,
    spreadsheet_url: String,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct FileParents {
    #[serde(default)]
    parents: Vec<String>,
}

pub struct SheetsClient {
    client: Client,
    credentials: GoogleCredentials,
    token_url: Url,
    sheets_base: Url,
    drive_base: Url,
    tokens: TokenCache,
    retry: RetryPolicy,
}

fn parse_base_url(raw: &str) -> Result<Url, SheetsError> {
    Url::parse(&format!("{}/", raw.trim_end_matches('/'))).map_err(|e| {
        SheetsError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        }
    })
}

fn join(base: &Url, path: &str) -> Result<Url, SheetsError> {
    base.join(path).map_err(|e| SheetsError::InvalidBaseUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

/// Google wraps errors as `{"error": {"message": ...}}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error_description"))
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| lmi_core::truncate_chars(body.trim(), 200))
}

async fn send(request: RequestBuilder) -> Result<Value, SheetsError> {
    let response = request.send().await?;
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SheetsError::RateLimited);
    }
    let body = response.text().await?;
    if !status.is_success() {
        return Err(SheetsError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| SheetsError::Deserialize {
        context: "google api response".to_string(),
        source: e,
    })
}

impl SheetsClient {
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the HTTP client cannot be built or an
    /// endpoint URL is invalid.
    pub fn new(
        credentials: GoogleCredentials,
        endpoints: &GoogleEndpoints,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, SheetsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            credentials,
            token_url: join(&parse_base_url(&endpoints.oauth)?, "token")?,
            sheets_base: parse_base_url(&endpoints.sheets)?,
            drive_base: parse_base_url(&endpoints.drive)?,
            tokens: TokenCache::new(),
            retry,
        })
    }

    async fn token(&self) -> Result<String, SheetsError> {
        self.tokens.get_or_refresh(|| self.refresh_token()).await
    }

    async fn refresh_token(&self) -> Result<AccessToken, SheetsError> {
        tracing::debug!("refreshing google access token");
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let body = retry_with_backoff(&self.retry, "google token refresh", || {
            send(self.client.post(self.token_url.clone()).form(&form))
        })
        .await
        .map_err(|e| match e {
            SheetsError::Api { message, .. } => SheetsError::Auth(message),
            other => other,
        })?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| SheetsError::Deserialize {
                context: "google token response".to_string(),
                source: e,
            })?;
        Ok(AccessToken::expiring_in(token.access_token, token.expires_in))
    }

    /// Sends an authorized request built by `build`, with retry.
    async fn call<F>(&self, label: &str, build: F) -> Result<Value, SheetsError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.token().await?;
        retry_with_backoff(&self.retry, label, || {
            send(build(&self.client).bearer_auth(&token))
        })
        .await
    }

    /// # Errors
    ///
    /// Returns [`SheetsError`] if the token refresh or the create call fails.
    pub async fn create_spreadsheet(&self, title: &str) -> Result<Spreadsheet, SheetsError> {
        let url = join(&self.sheets_base, "v4/spreadsheets")?;
        let body = json!({"properties": {"title": title}});
        let value = self
            .call("sheets create", |c| c.post(url.clone()).json(&body))
            .await?;
        let created: CreateResponse =
            serde_json::from_value(value).map_err(|e| SheetsError::Deserialize {
                context: "spreadsheet create response".to_string(),
                source: e,
            })?;
        Ok(Spreadsheet {
            first_sheet_id: created.sheets.first().map(|s| s.properties.sheet_id),
            id: created.spreadsheet_id,
            url: created.spreadsheet_url,
        })
    }

    /// Applies structural requests such as `addSheet`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the API rejects the batch.
    pub async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<(), SheetsError> {
        let url = join(
            &self.sheets_base,
            &format!("v4/spreadsheets/{spreadsheet_id}:batchUpdate"),
        )?;
        let body = json!({"requests": requests});
        self.call("sheets batchUpdate", |c| c.post(url.clone()).json(&body))
            .await?;
        Ok(())
    }

    /// Writes `(range, rows)` pairs with `valueInputOption=RAW`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the write is rejected.
    pub async fn write_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<(String, Vec<Vec<Value>>)>,
    ) -> Result<(), SheetsError> {
        let url = join(
            &self.sheets_base,
            &format!("v4/spreadsheets/{spreadsheet_id}/values:batchUpdate"),
        )?;
        let ranges: Vec<Value> = data
            .into_iter()
            .map(|(range, values)| json!({"range": range, "values": values}))
            .collect();
        let body = json!({"valueInputOption": "RAW", "data": ranges});
        self.call("sheets values batchUpdate", |c| c.post(url.clone()).json(&body))
            .await?;
        Ok(())
    }

    /// Moves the file into `folder_id`, detaching it from its current parents.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if either Drive call fails.
    pub async fn move_to_folder(&self, file_id: &str, folder_id: &str) -> Result<(), SheetsError> {
        let url = join(&self.drive_base, &format!("drive/v3/files/{file_id}"))?;
        let value = self
            .call("drive get parents", |c| {
                c.get(url.clone()).query(&[("fields", "parents")])
            })
            .await?;
        let current: FileParents = serde_json::from_value(value).unwrap_or_default();
        let previous = current.parents.join(",");
        self.call("drive move", |c| {
            c.patch(url.clone()).json(&json!({})).query(&[
                ("addParents", folder_id),
                ("removeParents", previous.as_str()),
                ("fields", "id,parents"),
            ])
        })
        .await?;
        Ok(())
    }

    /// Grants a Drive permission described by `permission`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if Drive rejects the permission.
    pub async fn create_permission(
        &self,
        file_id: &str,
        permission: &Value,
        notify: Option<bool>,
    ) -> Result<(), SheetsError> {
        let url = join(
            &self.drive_base,
            &format!("drive/v3/files/{file_id}/permissions"),
        )?;
        self.call("drive permission", |c| {
            let request = c.post(url.clone()).json(permission);
            match notify {
                Some(flag) => request.query(&[("sendNotificationEmail", flag)]),
                None => request,
            }
        })
        .await?;
        Ok(())
    }
}
