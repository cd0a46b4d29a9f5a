//! In-memory run status, fed by the progress listener and the final run.
//!
//! Lost on restart. Finished runs beyond the history limit are evicted
//! oldest first; runs still in flight are never evicted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use lmi_core::{ModuleKind, ModuleStatus};
use lmi_pipeline::{ModuleProgress, ModuleRegistry, PipelineRun, PipelineStatus, RunRequest};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleView {
    pub display_name: String,
    pub status: ModuleStatus,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunView {
    pub run_id: String,
    pub status: PipelineStatus,
    pub topic: String,
    pub requester: String,
    pub output_url: Option<String>,
    pub output_folder_url: Option<String>,
    pub errors: Vec<String>,
    pub modules: BTreeMap<String, ModuleView>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Finished runs kept for polling before the oldest are dropped.
pub const DEFAULT_RUN_HISTORY: usize = 500;

#[derive(Debug, Clone)]
pub struct RunStore {
    runs: Arc<RwLock<HashMap<String, RunView>>>,
    max_finished: usize,
}

impl Default for RunStore {
    fn default() -> Self {
        Self::with_history(DEFAULT_RUN_HISTORY)
    }
}

impl RunStore {
    #[must_use]
    pub fn with_history(max_finished: usize) -> Self {
        Self {
            runs: Arc::default(),
            max_finished,
        }
    }

    /// Records a freshly accepted run with every selected module pending.
    pub fn insert_pending(&self, request: &RunRequest, kinds: &[ModuleKind], registry: &ModuleRegistry) {
        let modules = kinds
            .iter()
            .map(|kind| {
                let display_name = registry
                    .get(*kind)
                    .map_or(kind.as_str(), |c| c.display_name());
                (
                    kind.as_str().to_string(),
                    ModuleView {
                        display_name: display_name.to_string(),
                        status: ModuleStatus::Pending,
                        message: String::new(),
                        started_at: None,
                        completed_at: None,
                    },
                )
            })
            .collect();

        let view = RunView {
            run_id: request.run_id.clone(),
            status: PipelineStatus::Running,
            topic: request.topic.clone(),
            requester: request.requester.clone(),
            output_url: None,
            output_folder_url: None,
            errors: Vec::new(),
            modules,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(view.run_id.clone(), view);
    }

    pub fn update_module(&self, run_id: &str, progress: &ModuleProgress) {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let Some(view) = runs.get_mut(run_id) else {
            tracing::debug!(run_id, "progress for unknown run ignored");
            return;
        };
        view.modules
            .insert(progress.name.clone(), module_view(progress));
    }

    /// Replaces the live view with the final run record.
    pub fn finish(&self, run: &PipelineRun) {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let started_at = runs.get(&run.run_id).map_or(run.started_at, |v| v.started_at);
        runs.insert(
            run.run_id.clone(),
            RunView {
                run_id: run.run_id.clone(),
                status: run.status,
                topic: run.topic.clone(),
                requester: run.requester.clone(),
                output_url: run.output_url.clone(),
                output_folder_url: run.output_folder_url.clone(),
                errors: run.errors.clone(),
                modules: run
                    .progress
                    .iter()
                    .map(|p| (p.name.clone(), module_view(p)))
                    .collect(),
                started_at,
                completed_at: run.completed_at,
            },
        );
        evict_finished(&mut runs, self.max_finished);
    }

    pub fn get(&self, run_id: &str) -> Option<RunView> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .cloned()
    }

    /// Every known run, newest first.
    pub fn list(&self) -> Vec<RunView> {
        let mut runs: Vec<RunView> = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }
}

/// Drops the oldest finished runs until at most `max_finished` remain.
fn evict_finished(runs: &mut HashMap<String, RunView>, max_finished: usize) {
    let mut finished: Vec<(DateTime<Utc>, String)> = runs
        .values()
        .filter(|v| v.status.is_terminal())
        .map(|v| (v.completed_at.unwrap_or(v.started_at), v.run_id.clone()))
        .collect();
    let Some(excess) = finished.len().checked_sub(max_finished).filter(|n| *n > 0) else {
        return;
    };
    finished.sort();
    for (_, run_id) in finished.into_iter().take(excess) {
        runs.remove(&run_id);
    }
    tracing::debug!(evicted = excess, "evicted finished runs from history");
}

fn module_view(progress: &ModuleProgress) -> ModuleView {
    ModuleView {
        display_name: progress.display_name.clone(),
        status: progress.status,
        message: progress.message.clone(),
        started_at: progress.started_at,
        completed_at: progress.completed_at,
    }
}
