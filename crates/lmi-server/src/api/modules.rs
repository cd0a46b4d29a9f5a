use axum::{
    extract::{Path, State},
    Extension, Json,
};
use lmi_core::{FieldSpec, ModuleKind, RawInputs, ValidationResult};
use lmi_pipeline::ModuleInfo;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ModuleItem {
    #[serde(flatten)]
    info: ModuleInfo,
    fields: Vec<FieldSpec>,
}

pub(super) async fn list_modules(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<ModuleItem>>> {
    let data = state
        .registry
        .available_modules()
        .into_iter()
        .zip(state.registry.iter())
        .map(|(info, collector)| ModuleItem {
            info,
            fields: collector.input_fields().to_vec(),
        })
        .collect();

    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn validate_module(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(name): Path<String>,
    Json(raw): Json<RawInputs>,
) -> Result<Json<ApiResponse<ValidationResult>>, ApiError> {
    let collector = name
        .parse::<ModuleKind>()
        .ok()
        .and_then(|kind| state.registry.get(kind))
        .ok_or_else(|| {
            ApiError::new(req_id.0.clone(), "not_found", format!("unknown module: {name}"))
        })?;

    Ok(Json(ApiResponse {
        data: collector.validate(&raw),
        meta: ResponseMeta::new(req_id.0),
    }))
}
