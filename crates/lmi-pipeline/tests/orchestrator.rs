use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lmi_core::{
    Availability, Cell, Collector, FieldKind, FieldSpec, ModuleInputs, ModuleKind, ModuleResult,
    ModuleStatus, OutputInfo, OutputRequest, OutputSink, RawInputs, SharingMode, SinkError, Table,
    TableSet, UpstreamArtifacts, REUSE_FROM_JOBS_FIELD, REUSE_FROM_TRENDS_FIELD,
    SKILLS_SUMMARY_TABLE, SKILL_COLUMN, TERM_COLUMN, TRENDS_SUMMARY_TABLE,
};
use lmi_pipeline::{
    ModuleProgress, ModuleRegistry, Orchestrator, PipelineStatus, RunRequest, RUN_SUMMARY_TABLE,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Behavior {
    Complete,
    Partial,
    Fail,
    Panic,
    /// Reports `completed` while also carrying an error.
    Mislabeled,
}

struct StubCollector {
    kind: ModuleKind,
    display: &'static str,
    behavior: Behavior,
    fields: Vec<FieldSpec>,
    calls: Arc<Mutex<Vec<(ModuleKind, UpstreamArtifacts)>>>,
}

impl StubCollector {
    fn new(
        kind: ModuleKind,
        display: &'static str,
        behavior: Behavior,
        calls: &Arc<Mutex<Vec<(ModuleKind, UpstreamArtifacts)>>>,
    ) -> Arc<dyn Collector> {
        let fields = match kind {
            ModuleKind::Skills => vec![
                FieldSpec::new(REUSE_FROM_JOBS_FIELD, "Reuse job skills", FieldKind::Checkbox)
                    .default_value(false),
                FieldSpec::new(
                    REUSE_FROM_TRENDS_FIELD,
                    "Reuse trend terms",
                    FieldKind::Checkbox,
                )
                .default_value(false),
            ],
            ModuleKind::Courses => vec![FieldSpec::new(
                "keywords",
                "Keywords",
                FieldKind::Text { min_len: 2 },
            )
            .required()],
            _ => Vec::new(),
        };
        Arc::new(Self {
            kind,
            display,
            behavior,
            fields,
            calls: Arc::clone(calls),
        })
    }
}

fn rows(columns: &[&str], values: &[&str]) -> Table {
    let mut table = Table::new(columns.iter().copied());
    for value in values {
        table.push_row(vec![Cell::from(*value)]);
    }
    table
}

#[async_trait]
impl Collector for StubCollector {
    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn display_name(&self) -> &'static str {
        self.display
    }

    fn description(&self) -> &'static str {
        "stub"
    }

    fn input_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn availability(&self) -> Availability {
        Availability::ready()
    }

    async fn execute(&self, _inputs: &ModuleInputs, upstream: &UpstreamArtifacts) -> ModuleResult {
        self.calls
            .lock()
            .expect("calls lock")
            .push((self.kind, upstream.clone()));

        let mut tables = TableSet::new();
        match self.kind {
            ModuleKind::Jobs => {
                tables.insert(
                    SKILLS_SUMMARY_TABLE,
                    rows(&[SKILL_COLUMN, "frequency"], &["python", "sql"]),
                );
            }
            ModuleKind::Trends => {
                tables.insert(
                    TRENDS_SUMMARY_TABLE,
                    rows(&[TERM_COLUMN, "direction"], &["python", "sql", "python"]),
                );
            }
            ModuleKind::Courses | ModuleKind::Skills => {}
        }
        tables.insert("Data", rows(&["value"], &["a", "b"]));

        match self.behavior {
            Behavior::Complete => ModuleResult::completed(tables),
            Behavior::Partial => {
                ModuleResult::from_outcome(tables, vec!["source down".to_string()], Vec::new())
            }
            Behavior::Fail => ModuleResult::failed(vec!["upstream API returned 500".to_string()]),
            Behavior::Panic => panic!("collector exploded"),
            Behavior::Mislabeled => {
                let mut result = ModuleResult::completed(tables);
                result.errors.push("source down".to_string());
                result
            }
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    available: bool,
    fail: bool,
    calls: Mutex<Vec<(String, Vec<String>, Option<String>, SharingMode)>>,
}

impl RecordingSink {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            ..Self::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            fail: true,
            ..Self::default()
        })
    }

    fn table_names(&self) -> Vec<String> {
        self.calls.lock().expect("sink lock")[0].1.clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().expect("sink lock").len()
    }
}

#[async_trait]
impl OutputSink for RecordingSink {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn create_output(&self, request: OutputRequest<'_>) -> Result<OutputInfo, SinkError> {
        self.calls.lock().expect("sink lock").push((
            request.title.to_string(),
            request.tables.names().map(str::to_string).collect(),
            request.share_with.map(str::to_string),
            request.sharing_mode,
        ));
        if self.fail {
            return Err(SinkError::Unavailable("quota exceeded".to_string()));
        }
        Ok(OutputInfo {
            artifact_url: "https://docs.google.com/spreadsheets/d/abc".to_string(),
            folder_url: None,
            shared_with: vec![],
        })
    }
}

type Calls = Arc<Mutex<Vec<(ModuleKind, UpstreamArtifacts)>>>;

fn registry(calls: &Calls, behaviors: &[(ModuleKind, &'static str, Behavior)]) -> ModuleRegistry {
    behaviors
        .iter()
        .fold(ModuleRegistry::builder(), |builder, (kind, display, behavior)| {
            builder.register(StubCollector::new(*kind, *display, *behavior, calls))
        })
        .build()
}

fn all_complete(calls: &Calls) -> ModuleRegistry {
    registry(
        calls,
        &[
            (ModuleKind::Skills, "Skill Taxonomy", Behavior::Complete),
            (ModuleKind::Trends, "Search Trends", Behavior::Complete),
            (ModuleKind::Courses, "Online Courses", Behavior::Complete),
            (ModuleKind::Jobs, "Job Postings & Labor Data", Behavior::Complete),
        ],
    )
}

fn raw(value: serde_json::Value) -> RawInputs {
    value.as_object().cloned().unwrap_or_default()
}

fn reuse_jobs() -> RawInputs {
    reuse(REUSE_FROM_JOBS_FIELD)
}

fn reuse_trends() -> RawInputs {
    reuse(REUSE_FROM_TRENDS_FIELD)
}

fn reuse(flag: &str) -> RawInputs {
    let mut inputs = RawInputs::new();
    inputs.insert(flag.to_string(), json!(true));
    inputs
}

fn upstream_for(calls: &Calls, kind: ModuleKind) -> UpstreamArtifacts {
    calls
        .lock()
        .expect("calls")
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, upstream)| upstream.clone())
        .expect("module executed")
}

// ---------------------------------------------------------------------------
// Sequencing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn modules_run_in_canonical_order_regardless_of_selection() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    let request = RunRequest::new("a@example.com", "Data", ["skills", "jobs", "trends", "courses"])
        .with_inputs("courses", raw(json!({"keywords": "sql"})));
    let run = orchestrator.execute(request).await;

    let order: Vec<_> = calls.lock().expect("calls").iter().map(|(k, _)| *k).collect();
    assert_eq!(order, ModuleKind::CANONICAL_ORDER.to_vec());
    let progress: Vec<_> = run.progress.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(progress, vec!["jobs", "courses", "trends", "skills"]);
    assert_eq!(run.status, PipelineStatus::Completed);
}

#[tokio::test]
async fn unknown_modules_are_skipped() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["weather", "jobs"]))
        .await;

    assert_eq!(run.progress.len(), 1);
    assert_eq!(run.status, PipelineStatus::Completed);
    assert!(run.module("weather").is_none());
}

#[tokio::test]
async fn unregistered_module_fails_without_stopping_the_run() {
    let calls = Calls::default();
    let registry = registry(&calls, &[(ModuleKind::Jobs, "Jobs", Behavior::Complete)]);
    let orchestrator = Orchestrator::new(registry, RecordingSink::ok());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs", "trends"]))
        .await;

    let trends = run.module("trends").expect("trends progress");
    assert_eq!(trends.status, ModuleStatus::Failed);
    assert!(trends.message.contains("module not registered"));
    assert_eq!(run.status, PipelineStatus::Partial);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_module_is_isolated() {
    let calls = Calls::default();
    let registry = registry(
        &calls,
        &[
            (ModuleKind::Jobs, "Jobs", Behavior::Complete),
            (ModuleKind::Trends, "Search Trends", Behavior::Panic),
            (ModuleKind::Skills, "Skill Taxonomy", Behavior::Complete),
        ],
    );
    let orchestrator = Orchestrator::new(registry, RecordingSink::ok());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs", "trends", "skills"]))
        .await;

    let trends = run.module("trends").expect("trends progress");
    assert_eq!(trends.status, ModuleStatus::Failed);
    assert_eq!(trends.message, "Error: collector exploded");
    assert!(trends.result.is_none());
    assert_eq!(run.errors, vec!["Search Trends: collector exploded"]);

    assert_eq!(
        run.module("skills").expect("skills progress").status,
        ModuleStatus::Completed
    );
    assert_eq!(run.status, PipelineStatus::Partial);
}

#[tokio::test]
async fn invalid_inputs_fail_only_that_module() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    let request = RunRequest::new("a@example.com", "Data", ["jobs", "courses"])
        .with_inputs("courses", raw(json!({"keywords": "x"})));
    let run = orchestrator.execute(request).await;

    let courses = run.module("courses").expect("courses progress");
    assert_eq!(courses.status, ModuleStatus::Failed);
    assert!(courses.message.starts_with("Failed: "));
    assert!(!calls
        .lock()
        .expect("calls")
        .iter()
        .any(|(k, _)| *k == ModuleKind::Courses));
    assert_eq!(run.status, PipelineStatus::Partial);
}

#[tokio::test]
async fn status_messages_reflect_outcome() {
    let calls = Calls::default();
    let registry = registry(
        &calls,
        &[
            (ModuleKind::Jobs, "Jobs", Behavior::Complete),
            (ModuleKind::Courses, "Courses", Behavior::Partial),
            (ModuleKind::Trends, "Trends", Behavior::Fail),
        ],
    );
    let orchestrator = Orchestrator::new(registry, RecordingSink::ok());

    let request = RunRequest::new("a@example.com", "Data", ["jobs", "courses", "trends"])
        .with_inputs("courses", raw(json!({"keywords": "sql"})));
    let run = orchestrator.execute(request).await;

    assert_eq!(run.module("jobs").expect("jobs").message, "Completed (4 rows)");
    assert_eq!(
        run.module("courses").expect("courses").message,
        "Completed with errors (2 rows)"
    );
    assert_eq!(
        run.module("trends").expect("trends").message,
        "Failed: upstream API returned 500"
    );
    assert_eq!(run.status, PipelineStatus::Partial);
}

#[tokio::test]
async fn mislabeled_result_is_reclassified_from_its_payload() {
    let calls = Calls::default();
    let registry = registry(&calls, &[(ModuleKind::Jobs, "Jobs", Behavior::Mislabeled)]);
    let orchestrator = Orchestrator::new(registry, RecordingSink::ok());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs"]))
        .await;

    let jobs = run.module("jobs").expect("jobs progress");
    assert_eq!(jobs.status, ModuleStatus::Partial);
    assert_eq!(jobs.message, "Completed with errors (4 rows)");
    let result = jobs.result.as_ref().expect("jobs result");
    assert_eq!(result.status, ModuleStatus::Partial);
    assert_eq!(result.errors, vec!["source down"]);
    assert_eq!(run.status, PipelineStatus::Partial);
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aggregate_uses_display_name_prefixes() {
    let calls = Calls::default();
    let sink = RecordingSink::ok();
    let orchestrator = Orchestrator::new(all_complete(&calls), sink.clone());

    orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs", "trends"]))
        .await;

    assert_eq!(
        sink.table_names(),
        vec![
            "Job Postings & Labor Data - Skills Summary",
            "Job Postings & Labor Data - Data",
            "Search Trends - Trends Summary",
            "Search Trends - Data",
        ]
    );
}

#[tokio::test]
async fn all_failed_run_still_produces_summary_artifact() {
    let calls = Calls::default();
    let registry = registry(
        &calls,
        &[
            (ModuleKind::Jobs, "Jobs", Behavior::Fail),
            (ModuleKind::Trends, "Trends", Behavior::Fail),
        ],
    );
    let sink = RecordingSink::ok();
    let orchestrator = Orchestrator::new(registry, sink.clone());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs", "trends"]))
        .await;

    assert_eq!(run.status, PipelineStatus::Failed);
    assert_eq!(sink.table_names(), vec![RUN_SUMMARY_TABLE]);
    assert!(run.output_url.is_some());
}

// ---------------------------------------------------------------------------
// Artifact threading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_skills_reach_skills_module_when_reuse_is_set() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    let request = RunRequest::new("a@example.com", "Data", ["jobs", "skills"])
        .with_inputs("skills", reuse_jobs());
    orchestrator.execute(request).await;

    let calls = calls.lock().expect("calls");
    let (_, upstream) = calls
        .iter()
        .find(|(k, _)| *k == ModuleKind::Skills)
        .expect("skills executed");
    assert_eq!(
        upstream.extracted_skills,
        Some(vec!["python".to_string(), "sql".to_string()])
    );
}

#[tokio::test]
async fn job_skills_are_withheld_without_reuse_flag() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs", "skills"]))
        .await;

    let calls = calls.lock().expect("calls");
    let (_, upstream) = calls
        .iter()
        .find(|(k, _)| *k == ModuleKind::Skills)
        .expect("skills executed");
    assert_eq!(upstream.extracted_skills, None);
}

#[tokio::test]
async fn trend_terms_reach_skills_module_deduplicated() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    let request = RunRequest::new("a@example.com", "Data", ["skills", "trends"])
        .with_inputs("skills", reuse_trends());
    let run = orchestrator.execute(request).await;

    assert_eq!(run.status, PipelineStatus::Completed);
    let upstream = upstream_for(&calls, ModuleKind::Skills);
    assert_eq!(
        upstream.trend_terms,
        Some(vec!["python".to_string(), "sql".to_string()])
    );
    assert_eq!(upstream.extracted_skills, None);
}

#[tokio::test]
async fn trend_terms_are_withheld_without_reuse_flag() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["skills", "trends"]))
        .await;

    assert_eq!(upstream_for(&calls, ModuleKind::Skills).trend_terms, None);
}

#[tokio::test]
async fn failed_trends_module_shares_no_terms() {
    let calls = Calls::default();
    let registry = registry(
        &calls,
        &[
            (ModuleKind::Trends, "Search Trends", Behavior::Fail),
            (ModuleKind::Skills, "Skill Taxonomy", Behavior::Complete),
        ],
    );
    let orchestrator = Orchestrator::new(registry, RecordingSink::ok());

    let request = RunRequest::new("a@example.com", "Data", ["skills", "trends"])
        .with_inputs("skills", reuse_trends());
    orchestrator.execute(request).await;

    assert_eq!(upstream_for(&calls, ModuleKind::Skills).trend_terms, None);
}

#[tokio::test]
async fn trends_receives_job_skills_as_hint() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok());

    orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["trends", "jobs"]))
        .await;

    let calls = calls.lock().expect("calls");
    let (_, upstream) = calls
        .iter()
        .find(|(k, _)| *k == ModuleKind::Trends)
        .expect("trends executed");
    assert_eq!(
        upstream.extracted_skills,
        Some(vec!["python".to_string(), "sql".to_string()])
    );
}

// ---------------------------------------------------------------------------
// Output decoupling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn output_failure_does_not_change_status() {
    let calls = Calls::default();
    let sink = RecordingSink::failing();
    let orchestrator = Orchestrator::new(all_complete(&calls), sink.clone());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs"]))
        .await;

    assert_eq!(run.status, PipelineStatus::Completed);
    assert!(run.output_url.is_none());
    assert_eq!(run.errors.len(), 1);
    assert!(run.errors[0].starts_with("Output creation failed: "));
    assert_eq!(sink.call_count(), 1);
}

#[tokio::test]
async fn unavailable_sink_is_recorded_and_skipped() {
    let calls = Calls::default();
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(all_complete(&calls), sink.clone());

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs"]))
        .await;

    assert_eq!(run.status, PipelineStatus::Completed);
    assert_eq!(sink.call_count(), 0);
    assert!(run.errors[0].starts_with("Output creation failed"));
}

#[tokio::test]
async fn sink_receives_topic_requester_and_sharing_mode() {
    let calls = Calls::default();
    let sink = RecordingSink::ok();
    let orchestrator = Orchestrator::new(all_complete(&calls), sink.clone());

    let request = RunRequest::new("analyst@example.com", "Data Engineering", ["jobs"])
        .with_sharing_mode(SharingMode::Anyone);
    let run = orchestrator.execute(request).await;

    let recorded = sink.calls.lock().expect("sink lock");
    let (title, _, share_with, mode) = &recorded[0];
    assert_eq!(title, "Data Engineering");
    assert_eq!(share_with.as_deref(), Some("analyst@example.com"));
    assert_eq!(*mode, SharingMode::Anyone);
    assert_eq!(
        run.output_url.as_deref(),
        Some("https://docs.google.com/spreadsheets/d/abc")
    );
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_reports_running_then_terminal() {
    let calls = Calls::default();
    let seen: Arc<Mutex<Vec<(String, ModuleStatus)>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok()).with_progress(
        Arc::new(move |_run_id: &str, progress: &ModuleProgress| {
            recorder
                .lock()
                .expect("seen lock")
                .push((progress.name.clone(), progress.status));
        }),
    );

    orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["trends", "jobs"]))
        .await;

    let seen = seen.lock().expect("seen lock");
    assert_eq!(
        *seen,
        vec![
            ("jobs".to_string(), ModuleStatus::Running),
            ("jobs".to_string(), ModuleStatus::Completed),
            ("trends".to_string(), ModuleStatus::Running),
            ("trends".to_string(), ModuleStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn panicking_listener_does_not_abort_the_run() {
    let calls = Calls::default();
    let orchestrator = Orchestrator::new(all_complete(&calls), RecordingSink::ok()).with_progress(
        Arc::new(|_run_id: &str, _progress: &ModuleProgress| panic!("listener exploded")),
    );

    let run = orchestrator
        .execute(RunRequest::new("a@example.com", "Data", ["jobs", "trends"]))
        .await;

    assert_eq!(run.status, PipelineStatus::Completed);
    assert!(run.errors.is_empty());
}
