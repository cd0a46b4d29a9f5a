use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use lmi_core::{ModuleKind, RawInputs, SharingMode};
use lmi_pipeline::RunRequest;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;
use crate::store::RunView;

use super::{ApiError, ApiResponse, AppState, FieldErrorDetail, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CreateRunBody {
    requester: String,
    topic: String,
    modules: Vec<String>,
    #[serde(default)]
    inputs: BTreeMap<String, RawInputs>,
    sharing_mode: Option<SharingMode>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreatedRun {
    run_id: String,
}

/// Validates the request, records a running view and starts the run in
/// the background.
pub(super) async fn create_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateRunBody>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedRun>>), ApiError> {
    let bad_request = |message: String| ApiError::new(req_id.0.clone(), "bad_request", message);

    if body.requester.trim().is_empty() {
        return Err(bad_request("requester is required".to_string()));
    }
    if body.topic.trim().is_empty() {
        return Err(bad_request("topic is required".to_string()));
    }
    if body.modules.is_empty() {
        return Err(bad_request("select at least one module".to_string()));
    }

    let mut kinds = Vec::new();
    for name in &body.modules {
        let kind = name
            .parse::<ModuleKind>()
            .map_err(|e| bad_request(e.to_string()))?;
        if state.registry.get(kind).is_none() {
            return Err(bad_request(format!("module not registered: {kind}")));
        }
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds.sort();

    let mut request = RunRequest::new(body.requester.trim(), body.topic.trim(), body.modules)
        .with_sharing_mode(
            body.sharing_mode
                .unwrap_or(state.config.default_sharing_mode),
        );
    for (name, inputs) in body.inputs {
        request = request.with_inputs(name, inputs);
    }

    let mut details = Vec::new();
    for kind in &kinds {
        let Some(collector) = state.registry.get(*kind) else {
            continue;
        };
        let raw = request.inputs_for(*kind).cloned().unwrap_or_default();
        let validation = collector.validate(&raw);
        details.extend(validation.errors().iter().map(|e| FieldErrorDetail {
            module: kind.as_str().to_string(),
            field: e.field.clone(),
            message: e.message.clone(),
        }));
    }
    if !details.is_empty() {
        return Err(
            ApiError::new(req_id.0, "validation_error", "module inputs are invalid")
                .with_details(details),
        );
    }

    state
        .runs
        .insert_pending(&request, &kinds, &state.registry);
    let run_id = request.run_id.clone();
    tracing::info!(run_id = %run_id, topic = %request.topic, "run accepted");

    let orchestrator = state.orchestrator.clone();
    let runs = state.runs.clone();
    tokio::spawn(async move {
        let run = orchestrator.execute(request).await;
        runs.finish(&run);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: CreatedRun { run_id },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<String>,
) -> Result<Json<ApiResponse<RunView>>, ApiError> {
    let view = state
        .runs
        .get(&run_id)
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "run not found"))?;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<RunView>>> {
    Json(ApiResponse {
        data: state.runs.list(),
        meta: ResponseMeta::new(req_id.0),
    })
}
