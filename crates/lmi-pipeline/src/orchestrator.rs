//! Sequential execution of the selected modules for one run.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use lmi_core::{
    resolve_inputs, Collector, ModuleKind, ModuleResult, ModuleStatus, OutputRequest, OutputSink,
    TableSet, UpstreamArtifacts, REUSE_FROM_JOBS_FIELD, REUSE_FROM_TRENDS_FIELD,
    SKILLS_SUMMARY_TABLE, SKILL_COLUMN, TERM_COLUMN, TRENDS_SUMMARY_TABLE,
};

use crate::aggregate::aggregate_tables;
use crate::progress::ProgressListener;
use crate::registry::ModuleRegistry;
use crate::run::{classify_run, ModuleProgress, PipelineRun, PipelineStatus, RunRequest};

/// Runs modules one at a time in canonical order, threads artifacts
/// between them, and hands the merged tables to the output sink once.
///
/// The orchestrator holds no per-run state, so one instance can serve
/// concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    registry: ModuleRegistry,
    sink: Arc<dyn OutputSink>,
    listener: Option<Arc<dyn ProgressListener>>,
    notify_on_share: bool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(registry: ModuleRegistry, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            registry,
            sink,
            listener: None,
            notify_on_share: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Whether the sink should email the requester when sharing.
    #[must_use]
    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify_on_share = notify;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Executes `request` to completion.
    ///
    /// Never fails: module errors, panics and output problems are all
    /// recorded on the returned [`PipelineRun`].
    pub async fn execute(&self, request: RunRequest) -> PipelineRun {
        let mut run = PipelineRun::new(&request);
        run.status = PipelineStatus::Running;

        let kinds = selected_kinds(&request);
        tracing::info!(
            run_id = %run.run_id,
            topic = %run.topic,
            modules = ?kinds,
            "pipeline run started"
        );

        run.progress = kinds
            .iter()
            .map(|kind| {
                let display = self
                    .registry
                    .get(*kind)
                    .map_or(kind.as_str(), |c| c.display_name());
                ModuleProgress::pending(*kind, display)
            })
            .collect();

        let mut upstream = UpstreamArtifacts::none();
        for kind in kinds {
            self.run_module(&mut run, &request, kind, &mut upstream).await;
        }

        run.completed_at = Some(Utc::now());
        let tables = aggregate_tables(&run);
        self.deliver(&mut run, &tables).await;

        run.status = classify_run(run.progress.iter().map(|p| p.status));

        tracing::info!(
            run_id = %run.run_id,
            status = %run.status,
            tables = tables.len(),
            output_url = run.output_url.as_deref().unwrap_or("-"),
            "pipeline run finished"
        );
        run
    }

    async fn run_module(
        &self,
        run: &mut PipelineRun,
        request: &RunRequest,
        kind: ModuleKind,
        upstream: &mut UpstreamArtifacts,
    ) {
        let Some(collector) = self.registry.get(kind).cloned() else {
            tracing::warn!(run_id = %run.run_id, module = %kind, "selected module is not registered");
            self.start(run, kind);
            self.finish(run, kind, ModuleResult::failed(vec!["module not registered".to_string()]));
            return;
        };

        self.start(run, kind);

        let raw = request.inputs_for(kind).cloned().unwrap_or_default();
        let validation = collector.validate(&raw);
        if !validation.is_valid() {
            self.finish(run, kind, ModuleResult::failed(vec![validation.to_string()]));
            return;
        }
        let inputs = match resolve_inputs(collector.input_fields(), &raw) {
            Ok(inputs) => inputs,
            Err(validation) => {
                self.finish(run, kind, ModuleResult::failed(vec![validation.to_string()]));
                return;
            }
        };
        run.module_inputs
            .insert(kind.as_str().to_string(), inputs.clone());

        let module_upstream = match kind {
            ModuleKind::Trends => UpstreamArtifacts {
                extracted_skills: upstream.extracted_skills.clone(),
                trend_terms: None,
            },
            ModuleKind::Skills => UpstreamArtifacts {
                extracted_skills: upstream
                    .extracted_skills
                    .clone()
                    .filter(|_| inputs.flag(REUSE_FROM_JOBS_FIELD)),
                trend_terms: upstream
                    .trend_terms
                    .clone()
                    .filter(|_| inputs.flag(REUSE_FROM_TRENDS_FIELD)),
            },
            ModuleKind::Jobs | ModuleKind::Courses => UpstreamArtifacts::none(),
        };

        let started = Utc::now();
        let outcome = AssertUnwindSafe(collector.execute(&inputs, &module_upstream))
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => {
                let reported = result.status;
                let result = result.normalized();
                if result.status != reported {
                    tracing::warn!(
                        run_id = %run.run_id,
                        module = %kind,
                        reported = %reported,
                        status = %result.status,
                        "module result status disagreed with its payload"
                    );
                }
                let result = if result.completed_at.is_none() {
                    result.timed(started)
                } else {
                    result
                };
                if result.status.produced_data() {
                    capture_artifacts(kind, &result.tables, upstream);
                }
                self.finish(run, kind, result);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.abort(run, kind, collector.as_ref(), &message);
            }
        }
    }

    fn start(&self, run: &mut PipelineRun, kind: ModuleKind) {
        let run_id = run.run_id.clone();
        let Some(progress) = run.module_mut(kind) else {
            return;
        };
        progress.status = ModuleStatus::Running;
        progress.message = format!("Running {}...", progress.display_name);
        progress.started_at = Some(Utc::now());
        tracing::info!(run_id = %run_id, module = %kind, "module started");
        self.notify(&run_id, progress);
    }

    fn finish(&self, run: &mut PipelineRun, kind: ModuleKind, result: ModuleResult) {
        let run_id = run.run_id.clone();
        let Some(progress) = run.module_mut(kind) else {
            return;
        };
        let rows = result.row_count();
        progress.status = result.status;
        progress.message = status_message(&result);
        progress.completed_at = Some(Utc::now());

        match result.status {
            ModuleStatus::Failed => tracing::error!(
                run_id = %run_id,
                module = %kind,
                errors = ?result.errors,
                "module failed"
            ),
            _ => tracing::info!(
                run_id = %run_id,
                module = %kind,
                status = %result.status,
                rows,
                warnings = result.warnings.len(),
                "module finished"
            ),
        }

        progress.result = Some(result);
        self.notify(&run_id, progress);
    }

    fn abort(&self, run: &mut PipelineRun, kind: ModuleKind, collector: &dyn Collector, message: &str) {
        tracing::error!(run_id = %run.run_id, module = %kind, error = message, "module panicked");
        run.errors
            .push(format!("{}: {message}", collector.display_name()));

        let run_id = run.run_id.clone();
        let Some(progress) = run.module_mut(kind) else {
            return;
        };
        progress.status = ModuleStatus::Failed;
        progress.message = format!("Error: {message}");
        progress.completed_at = Some(Utc::now());
        progress.result = None;
        self.notify(&run_id, progress);
    }

    async fn deliver(&self, run: &mut PipelineRun, tables: &TableSet) {
        if !self.sink.is_available() {
            tracing::warn!(run_id = %run.run_id, "output sink unavailable; skipping artifact");
            run.errors
                .push("Output creation failed: output sink is not configured".to_string());
            return;
        }

        let outcome = {
            let request = OutputRequest {
                title: &run.topic,
                tables,
                share_with: Some(run.requester.as_str()).filter(|r| !r.trim().is_empty()),
                sharing_mode: run.sharing_mode,
                notify: self.notify_on_share,
            };
            AssertUnwindSafe(self.sink.create_output(request))
                .catch_unwind()
                .await
        };

        match outcome {
            Ok(Ok(info)) => {
                run.output_url = Some(info.artifact_url);
                run.output_folder_url = info.folder_url;
            }
            Ok(Err(e)) => {
                tracing::error!(run_id = %run.run_id, error = %e, "output creation failed");
                run.errors.push(format!("Output creation failed: {e}"));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(run_id = %run.run_id, error = %message, "output sink panicked");
                run.errors.push(format!("Output creation failed: {message}"));
            }
        }
    }

    fn notify(&self, run_id: &str, progress: &ModuleProgress) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        let delivered =
            std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_progress(run_id, progress)));
        if delivered.is_err() {
            tracing::warn!(run_id, module = %progress.name, "progress listener panicked");
        }
    }
}

/// Recognised selected modules, deduplicated, in canonical order.
fn selected_kinds(request: &RunRequest) -> Vec<ModuleKind> {
    let mut kinds = BTreeSet::new();
    for name in &request.selected_modules {
        match name.parse::<ModuleKind>() {
            Ok(kind) => {
                kinds.insert(kind);
            }
            Err(e) => tracing::warn!(run_id = %request.run_id, error = %e, "skipping unknown module"),
        }
    }
    kinds.into_iter().collect()
}

fn capture_artifacts(kind: ModuleKind, tables: &TableSet, upstream: &mut UpstreamArtifacts) {
    match kind {
        ModuleKind::Jobs => {
            let skills = tables
                .get(SKILLS_SUMMARY_TABLE)
                .map(|t| t.text_column(SKILL_COLUMN))
                .unwrap_or_default();
            if !skills.is_empty() {
                upstream.extracted_skills = Some(skills);
            }
        }
        ModuleKind::Trends => {
            let mut seen = BTreeSet::new();
            let terms: Vec<String> = tables
                .get(TRENDS_SUMMARY_TABLE)
                .map(|t| t.text_column(TERM_COLUMN))
                .unwrap_or_default()
                .into_iter()
                .filter(|term| seen.insert(term.clone()))
                .collect();
            if !terms.is_empty() {
                upstream.trend_terms = Some(terms);
            }
        }
        ModuleKind::Courses | ModuleKind::Skills => {}
    }
}

fn status_message(result: &ModuleResult) -> String {
    let rows = result.row_count();
    match result.status {
        ModuleStatus::Completed => format!("Completed ({rows} rows)"),
        ModuleStatus::Partial => format!("Completed with errors ({rows} rows)"),
        ModuleStatus::Failed => format!(
            "Failed: {}",
            result
                .errors
                .iter()
                .take(2)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; ")
        ),
        ModuleStatus::Pending | ModuleStatus::Running => String::new(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "module panicked".to_string())
}
