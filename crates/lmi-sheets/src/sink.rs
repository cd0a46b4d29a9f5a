use async_trait::async_trait;
use chrono::Utc;
use lmi_core::{
    AppConfig, OutputInfo, OutputRequest, OutputSink, RetryPolicy, SharingMode, SinkError,
};
use serde_json::{json, Value};

use crate::client::{GoogleEndpoints, SheetsClient};
use crate::error::SheetsError;
use crate::tabs::{a1_range, table_values, unique_tab_names};

const TITLE_PREFIX: &str = "Market Intelligence";

/// Writes each table to its own tab of a new Google Spreadsheet.
pub struct SheetsSink {
    client: Option<SheetsClient>,
    folder_id: Option<String>,
}

impl SheetsSink {
    /// Builds the sink from configuration. Without Google credentials the
    /// sink exists but reports itself unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SheetsError> {
        Self::with_endpoints(config, &GoogleEndpoints::default())
    }

    /// # Errors
    ///
    /// See [`SheetsSink::from_config`].
    pub fn with_endpoints(
        config: &AppConfig,
        endpoints: &GoogleEndpoints,
    ) -> Result<Self, SheetsError> {
        let retry = RetryPolicy::new(config.http_max_retries, config.retry_backoff_base_ms);
        let client = config
            .google
            .clone()
            .map(|creds| SheetsClient::new(creds, endpoints, config.http_timeout_secs, retry))
            .transpose()?;
        Ok(Self {
            client,
            folder_id: config.google_drive_folder_id.clone(),
        })
    }

    #[must_use]
    pub fn new(client: Option<SheetsClient>, folder_id: Option<String>) -> Self {
        Self { client, folder_id }
    }
}

/// `"Market Intelligence - {topic} - {YYYY-MM-DD HH:MM}"`, in UTC.
fn spreadsheet_title(topic: &str) -> String {
    format!(
        "{TITLE_PREFIX} - {topic} - {}",
        Utc::now().format("%Y-%m-%d %H:%M")
    )
}

/// Drive permission body for the requested sharing, if any.
fn permission_for(mode: SharingMode, share_with: Option<&str>) -> Option<(Value, String)> {
    match (mode, share_with) {
        (SharingMode::Anyone, _) => Some((
            json!({"type": "anyone", "role": "reader"}),
            "Anyone with link".to_string(),
        )),
        (SharingMode::Restricted, Some(email)) if !email.trim().is_empty() => Some((
            json!({"type": "user", "role": "reader", "emailAddress": email}),
            email.to_string(),
        )),
        (SharingMode::Restricted, _) => None,
    }
}

#[async_trait]
impl OutputSink for SheetsSink {
    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn create_output(&self, request: OutputRequest<'_>) -> Result<OutputInfo, SinkError> {
        let Some(client) = &self.client else {
            return Err(SinkError::Unavailable(
                "Google credentials not configured".to_string(),
            ));
        };

        let title = spreadsheet_title(request.title);
        tracing::info!(title, "creating spreadsheet");
        let sheet = client
            .create_spreadsheet(&title)
            .await
            .map_err(SinkError::backend)?;

        // Header-only tables carry no data and are not written.
        let tables: Vec<_> = request
            .tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .collect();
        let tab_names = unique_tab_names(tables.iter().map(|(name, _)| *name));

        if !tables.is_empty() {
            let structure: Vec<Value> = tab_names
                .iter()
                .enumerate()
                .map(|(i, name)| match (i, sheet.first_sheet_id) {
                    (0, Some(sheet_id)) => json!({"updateSheetProperties": {
                        "properties": {"sheetId": sheet_id, "title": name},
                        "fields": "title"
                    }}),
                    _ => json!({"addSheet": {"properties": {"title": name}}}),
                })
                .collect();
            let data: Vec<_> = tab_names
                .iter()
                .zip(&tables)
                .map(|(name, (_, table))| (a1_range(name), table_values(table)))
                .collect();

            let written = match client.batch_update(&sheet.id, structure).await {
                Ok(()) => client.write_values(&sheet.id, data).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => tracing::info!(tabs = tab_names.len(), "wrote spreadsheet data"),
                Err(e) => {
                    tracing::warn!(spreadsheet_id = %sheet.id, error = %e, "failed to write spreadsheet data");
                }
            }
        }

        let mut folder_url = None;
        if let Some(folder_id) = self.folder_id.as_deref() {
            match client.move_to_folder(&sheet.id, folder_id).await {
                Ok(()) => {
                    folder_url = Some(format!("https://drive.google.com/drive/folders/{folder_id}"));
                }
                Err(e) => tracing::warn!(folder_id, error = %e, "could not move spreadsheet to folder"),
            }
        }

        let mut shared_with = Vec::new();
        if let Some((permission, label)) = permission_for(request.sharing_mode, request.share_with)
        {
            let notify = (request.sharing_mode == SharingMode::Restricted).then_some(request.notify);
            match client.create_permission(&sheet.id, &permission, notify).await {
                Ok(()) => shared_with.push(label),
                Err(e) => tracing::warn!(error = %e, "could not set sharing"),
            }
        }

        Ok(OutputInfo {
            artifact_url: sheet.url,
            folder_url,
            shared_with,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_includes_prefix_and_topic() {
        let title = spreadsheet_title("Data Analysts");
        assert!(title.starts_with("Market Intelligence - Data Analysts - "));
        // "YYYY-MM-DD HH:MM"
        assert_eq!(title.rsplit(" - ").next().map(str::len), Some(16));
    }

    #[test]
    fn permission_for_anyone_ignores_email() {
        let (body, label) = permission_for(SharingMode::Anyone, Some("a@b.com")).unwrap();
        assert_eq!(body["type"], "anyone");
        assert_eq!(label, "Anyone with link");
    }

    #[test]
    fn permission_for_restricted_needs_email() {
        assert!(permission_for(SharingMode::Restricted, None).is_none());
        let (body, label) = permission_for(SharingMode::Restricted, Some("a@b.com")).unwrap();
        assert_eq!(body["emailAddress"], "a@b.com");
        assert_eq!(label, "a@b.com");
    }
}
