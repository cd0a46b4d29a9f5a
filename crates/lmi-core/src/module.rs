//! Module identities and the result envelope every collector returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::TableSet;

/// Table the job collector emits its skill frequencies in.
pub const SKILLS_SUMMARY_TABLE: &str = "Skills Summary";
/// Column of [`SKILLS_SUMMARY_TABLE`] holding the skill name.
pub const SKILL_COLUMN: &str = "skill";
/// Table the trend collector emits its per-term summary in.
pub const TRENDS_SUMMARY_TABLE: &str = "Trends Summary";
/// Column of [`TRENDS_SUMMARY_TABLE`] holding the search term.
pub const TERM_COLUMN: &str = "term";
/// Skill-collector checkbox asking for job-extracted skills.
pub const REUSE_FROM_JOBS_FIELD: &str = "reuse_from_jobs";
/// Skill-collector checkbox asking for trend terms.
pub const REUSE_FROM_TRENDS_FIELD: &str = "reuse_from_trends";

/// The four collector kinds, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Jobs,
    Courses,
    Trends,
    Skills,
}

impl ModuleKind {
    /// Execution order. Jobs and trends feed skills, so they come first.
    pub const CANONICAL_ORDER: [ModuleKind; 4] = [
        ModuleKind::Jobs,
        ModuleKind::Courses,
        ModuleKind::Trends,
        ModuleKind::Skills,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Jobs => "jobs",
            ModuleKind::Courses => "courses",
            ModuleKind::Trends => "trends",
            ModuleKind::Skills => "skills",
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown module: {0}")]
pub struct UnknownModule(pub String);

impl std::str::FromStr for ModuleKind {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jobs" => Ok(ModuleKind::Jobs),
            "courses" => Ok(ModuleKind::Courses),
            "trends" => Ok(ModuleKind::Trends),
            "skills" | "lightcast" => Ok(ModuleKind::Skills),
            _ => Err(UnknownModule(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

impl ModuleStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ModuleStatus::Completed | ModuleStatus::Failed | ModuleStatus::Partial
        )
    }

    /// Completed or partial: the module produced usable data.
    #[must_use]
    pub fn produced_data(self) -> bool {
        matches!(self, ModuleStatus::Completed | ModuleStatus::Partial)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleStatus::Pending => "pending",
            ModuleStatus::Running => "running",
            ModuleStatus::Completed => "completed",
            ModuleStatus::Failed => "failed",
            ModuleStatus::Partial => "partial",
        }
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one collector execution.
///
/// The constructors keep the status consistent with the payload: a failed
/// result carries no tables, a partial result carries both tables and errors,
/// and a completed result carries no errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub status: ModuleStatus,
    pub tables: TableSet,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ModuleResult {
    /// Classifies a collector's raw outcome.
    ///
    /// No errors means completed. Errors with at least one non-empty table
    /// means partial. Errors and no rows means failed, with tables dropped.
    #[must_use]
    pub fn from_outcome(mut tables: TableSet, errors: Vec<String>, warnings: Vec<String>) -> Self {
        let status = if errors.is_empty() {
            ModuleStatus::Completed
        } else if tables.has_rows() {
            ModuleStatus::Partial
        } else {
            tables.clear();
            ModuleStatus::Failed
        };
        Self {
            status,
            tables,
            errors,
            warnings,
            metadata: serde_json::Map::new(),
            started_at: None,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn completed(tables: TableSet) -> Self {
        Self::from_outcome(tables, Vec::new(), Vec::new())
    }

    /// A failed result. An empty `errors` list gets a generic message so the
    /// failure is never silent.
    #[must_use]
    pub fn failed(mut errors: Vec<String>) -> Self {
        if errors.is_empty() {
            errors.push("module failed without reporting an error".to_string());
        }
        Self::from_outcome(TableSet::new(), errors, Vec::new())
    }

    /// Re-derives `status` from the payload, for results whose public fields
    /// were set by hand. An explicit failure stays failed and loses its tables.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut result = if self.status == ModuleStatus::Failed {
            Self::failed(self.errors).with_warnings(self.warnings)
        } else {
            Self::from_outcome(self.tables, self.errors, self.warnings)
        };
        result.metadata = self.metadata;
        result.started_at = self.started_at;
        result.completed_at = self.completed_at;
        result
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn timed(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.completed_at = Some(Utc::now());
        self
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.total_rows()
    }

    /// Wall-clock duration when both timestamps are set.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

/// Values produced by earlier modules in the same run.
///
/// Every collector receives this; the ones that don't need it ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamArtifacts {
    /// Skill names from the job collector's skills summary, in order.
    pub extracted_skills: Option<Vec<String>>,
    /// Unique terms from the trend collector's summary table.
    pub trend_terms: Option<Vec<String>>,
}

impl UpstreamArtifacts {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Table};

    fn table_with_row() -> Table {
        let mut t = Table::new(["a"]);
        t.push_row(vec![Cell::from("x")]);
        t
    }

    #[test]
    fn canonical_order_is_jobs_courses_trends_skills() {
        let names: Vec<_> = ModuleKind::CANONICAL_ORDER.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["jobs", "courses", "trends", "skills"]);
    }

    #[test]
    fn module_kind_parses_lightcast_alias() {
        assert_eq!("lightcast".parse::<ModuleKind>(), Ok(ModuleKind::Skills));
        assert_eq!(" Jobs ".parse::<ModuleKind>(), Ok(ModuleKind::Jobs));
        assert!("weather".parse::<ModuleKind>().is_err());
    }

    #[test]
    fn from_outcome_without_errors_is_completed() {
        let result = ModuleResult::from_outcome(TableSet::new(), vec![], vec!["no rows".into()]);
        assert_eq!(result.status, ModuleStatus::Completed);
        assert_eq!(result.warnings, vec!["no rows"]);
    }

    #[test]
    fn from_outcome_with_errors_and_data_is_partial() {
        let mut tables = TableSet::new();
        tables.insert("Courses", table_with_row());
        let result = ModuleResult::from_outcome(tables, vec!["edX: timeout".into()], vec![]);
        assert_eq!(result.status, ModuleStatus::Partial);
        assert_eq!(result.tables.len(), 1);
    }

    #[test]
    fn from_outcome_with_errors_and_only_empty_tables_is_failed() {
        let mut tables = TableSet::new();
        tables.insert("Courses", Table::new(["a"]));
        let result = ModuleResult::from_outcome(tables, vec!["boom".into()], vec![]);
        assert_eq!(result.status, ModuleStatus::Failed);
        assert!(result.tables.is_empty(), "failed results carry no tables");
    }

    #[test]
    fn failed_never_has_empty_errors() {
        let result = ModuleResult::failed(vec![]);
        assert_eq!(result.status, ModuleStatus::Failed);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn normalized_downgrades_completed_with_errors() {
        let mut tables = TableSet::new();
        tables.insert("Courses", table_with_row());
        let mut result = ModuleResult::completed(tables);
        result.errors.push("edX: timeout".into());

        let result = result.normalized();
        assert_eq!(result.status, ModuleStatus::Partial);
        assert_eq!(result.errors, vec!["edX: timeout"]);
    }

    #[test]
    fn normalized_fails_partial_without_rows() {
        let mut result = ModuleResult::completed(TableSet::new()).with_metadata("query", "rust");
        result.status = ModuleStatus::Partial;
        result.errors.push("boom".into());

        let result = result.normalized();
        assert_eq!(result.status, ModuleStatus::Failed);
        assert_eq!(result.metadata["query"], "rust");
    }

    #[test]
    fn normalized_keeps_explicit_failure_and_drops_tables() {
        let mut tables = TableSet::new();
        tables.insert("Courses", table_with_row());
        let mut result = ModuleResult::completed(tables);
        result.status = ModuleStatus::Failed;

        let result = result.normalized();
        assert_eq!(result.status, ModuleStatus::Failed);
        assert!(result.tables.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn normalized_leaves_consistent_results_alone() {
        let mut tables = TableSet::new();
        tables.insert("Courses", table_with_row());
        let result = ModuleResult::from_outcome(tables, vec!["edX: timeout".into()], vec![]);
        assert_eq!(result.clone().normalized(), result);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ModuleStatus::Partial).expect("serialize");
        assert_eq!(json, "\"partial\"");
    }
}
