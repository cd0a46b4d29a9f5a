//! Run records: the request, per-module progress and the final outcome.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lmi_core::{ModuleInputs, ModuleKind, ModuleResult, ModuleStatus, RawInputs, SharingMode};
use serde::Serialize;
use uuid::Uuid;

/// Overall run state: `pending → running → {completed, partial, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl PipelineStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Partial => "partial",
            PipelineStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStatus::Completed | PipelineStatus::Partial | PipelineStatus::Failed
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the run status from module statuses alone.
///
/// All completed is completed, all failed is failed, any data-producing
/// module makes the run partial. Anything else, including an empty
/// selection, is failed.
pub fn classify_run<I>(statuses: I) -> PipelineStatus
where
    I: IntoIterator<Item = ModuleStatus>,
{
    let statuses: Vec<ModuleStatus> = statuses.into_iter().collect();
    if statuses.is_empty() {
        return PipelineStatus::Failed;
    }
    if statuses.iter().all(|s| *s == ModuleStatus::Completed) {
        PipelineStatus::Completed
    } else if statuses.iter().all(|s| *s == ModuleStatus::Failed) {
        PipelineStatus::Failed
    } else if statuses.iter().any(|s| s.produced_data()) {
        PipelineStatus::Partial
    } else {
        PipelineStatus::Failed
    }
}

/// A caller's request to run a set of modules against a topic.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: String,
    pub requester: String,
    pub topic: String,
    /// Module names as the caller chose them. Execution order is fixed
    /// regardless of this order.
    pub selected_modules: Vec<String>,
    /// Raw inputs keyed by module name.
    pub module_inputs: BTreeMap<String, RawInputs>,
    pub sharing_mode: SharingMode,
}

impl RunRequest {
    /// A request with a fresh run id, no inputs and restricted sharing.
    pub fn new<I, S>(requester: impl Into<String>, topic: impl Into<String>, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_id: Uuid::new_v4().to_string(),
            requester: requester.into(),
            topic: topic.into(),
            selected_modules: modules.into_iter().map(Into::into).collect(),
            module_inputs: BTreeMap::new(),
            sharing_mode: SharingMode::default(),
        }
    }

    #[must_use]
    pub fn with_inputs(mut self, module: impl Into<String>, inputs: RawInputs) -> Self {
        self.module_inputs.insert(module.into(), inputs);
        self
    }

    #[must_use]
    pub fn with_sharing_mode(mut self, mode: SharingMode) -> Self {
        self.sharing_mode = mode;
        self
    }

    /// Raw inputs for `kind`, accepting any alias the kind parses from.
    #[must_use]
    pub fn inputs_for(&self, kind: ModuleKind) -> Option<&RawInputs> {
        self.module_inputs.get(kind.as_str()).or_else(|| {
            self.module_inputs
                .iter()
                .find(|(name, _)| name.parse::<ModuleKind>().ok() == Some(kind))
                .map(|(_, inputs)| inputs)
        })
    }
}

/// Per-module state owned by the orchestrator for the life of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleProgress {
    pub name: String,
    pub display_name: String,
    pub status: ModuleStatus,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ModuleResult>,
}

impl ModuleProgress {
    #[must_use]
    pub fn pending(kind: ModuleKind, display_name: impl Into<String>) -> Self {
        Self {
            name: kind.as_str().to_string(),
            display_name: display_name.into(),
            status: ModuleStatus::Pending,
            message: String::new(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }
}

/// The complete record of one run, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub requester: String,
    pub topic: String,
    pub selected_modules: Vec<String>,
    /// Resolved inputs per module, defaults applied.
    pub module_inputs: BTreeMap<String, ModuleInputs>,
    pub sharing_mode: SharingMode,
    pub status: PipelineStatus,
    /// One entry per recognised selected module, in canonical order.
    pub progress: Vec<ModuleProgress>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output_url: Option<String>,
    pub output_folder_url: Option<String>,
    /// Run-level errors: escaped module panics and output failures.
    pub errors: Vec<String>,
}

impl PipelineRun {
    #[must_use]
    pub fn new(request: &RunRequest) -> Self {
        Self {
            run_id: request.run_id.clone(),
            requester: request.requester.clone(),
            topic: request.topic.clone(),
            selected_modules: request.selected_modules.clone(),
            module_inputs: BTreeMap::new(),
            sharing_mode: request.sharing_mode,
            status: PipelineStatus::Pending,
            progress: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            output_url: None,
            output_folder_url: None,
            errors: Vec::new(),
        }
    }

    /// Progress for the module named `name` (any accepted alias).
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleProgress> {
        let kind: ModuleKind = name.parse().ok()?;
        self.progress.iter().find(|p| p.name == kind.as_str())
    }

    pub(crate) fn module_mut(&mut self, kind: ModuleKind) -> Option<&mut ModuleProgress> {
        self.progress.iter_mut().find(|p| p.name == kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ModuleStatus::{Completed, Failed, Partial, Pending, Running};

    #[test]
    fn classify_run_all_completed() {
        assert_eq!(classify_run([Completed, Completed]), PipelineStatus::Completed);
    }

    #[test]
    fn classify_run_all_failed() {
        assert_eq!(classify_run([Failed, Failed]), PipelineStatus::Failed);
    }

    #[test]
    fn classify_run_mixed_is_partial() {
        assert_eq!(classify_run([Completed, Failed]), PipelineStatus::Partial);
        assert_eq!(classify_run([Partial]), PipelineStatus::Partial);
        assert_eq!(classify_run([Partial, Completed]), PipelineStatus::Partial);
        assert_eq!(classify_run([Failed, Partial, Failed]), PipelineStatus::Partial);
    }

    #[test]
    fn classify_run_defaults_to_failed() {
        assert_eq!(classify_run([]), PipelineStatus::Failed);
        assert_eq!(classify_run([Pending, Running]), PipelineStatus::Failed);
        assert_eq!(classify_run([Failed, Running]), PipelineStatus::Failed);
    }

    #[test]
    fn classify_run_is_total_over_terminal_pairs() {
        let terminal = [Completed, Partial, Failed];
        for a in terminal {
            for b in terminal {
                let expected = match (a, b) {
                    (Completed, Completed) => PipelineStatus::Completed,
                    (Failed, Failed) => PipelineStatus::Failed,
                    _ => PipelineStatus::Partial,
                };
                assert_eq!(classify_run([a, b]), expected, "{a} + {b}");
            }
        }
    }

    #[test]
    fn run_request_assigns_unique_ids() {
        let a = RunRequest::new("a@example.com", "Topic", ["jobs"]);
        let b = RunRequest::new("a@example.com", "Topic", ["jobs"]);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.sharing_mode, SharingMode::Restricted);
    }

    #[test]
    fn inputs_for_accepts_alias_keys() {
        let mut raw = RawInputs::new();
        raw.insert("skills".to_string(), serde_json::json!("python"));
        let request = RunRequest::new("a@example.com", "Topic", ["lightcast"])
            .with_inputs("lightcast", raw.clone());
        assert_eq!(request.inputs_for(ModuleKind::Skills), Some(&raw));
        assert_eq!(request.inputs_for(ModuleKind::Jobs), None);
    }
}
