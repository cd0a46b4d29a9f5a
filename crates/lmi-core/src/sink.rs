use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::table::TableSet;

/// Who can open the produced artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingMode {
    /// Only explicitly shared users.
    #[default]
    Restricted,
    /// Anyone holding the link.
    Anyone,
}

impl SharingMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SharingMode::Restricted => "restricted",
            SharingMode::Anyone => "anyone",
        }
    }
}

impl std::fmt::Display for SharingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SharingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restricted" => Ok(SharingMode::Restricted),
            "anyone" => Ok(SharingMode::Anyone),
            other => Err(format!("expected restricted or anyone, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutputRequest<'a> {
    pub title: &'a str,
    pub tables: &'a TableSet,
    pub share_with: Option<&'a str>,
    pub sharing_mode: SharingMode,
    pub notify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub artifact_url: String,
    pub folder_url: Option<String>,
    pub shared_with: Vec<String>,
}

/// Turns aggregated tables into a shareable artifact.
///
/// Implementations truncate table names to
/// [`crate::MAX_TABLE_NAME_LEN`] and still produce an artifact when
/// `tables` is empty.
#[async_trait]
pub trait OutputSink: Send + Sync {
    fn is_available(&self) -> bool;

    /// # Errors
    ///
    /// Returns [`SinkError`] when the artifact could not be created.
    async fn create_output(&self, request: OutputRequest<'_>) -> Result<OutputInfo, SinkError>;
}
