// ============================================================
// API — Handlers
// ============================================================
//   GET  /         service banner + class list
//   GET  /health   model loading state
//   POST /predict  multipart `file` → DiagnosisReport
//
// /predict validates the upload on the async side, then runs
// the whole inference pipeline on a blocking thread: waiting for
// the model, classification and Grad-CAM are all synchronous.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};

use crate::api::{
    error::{ApiError, INVALID_FILE_TYPE, MISSING_FILE},
    types::{HealthResponse, PredictParams, RootResponse},
    AppState,
};
use crate::application::diagnose_use_case::DiagnoseUseCase;
use crate::domain::diagnosis::{DiagnosisReport, CLASS_NAMES};
use crate::ml::inferencer::DEVICE_LABEL;

/// Multipart field carrying the scan.
const FILE_FIELD: &str = "file";

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Brain Tumor Classifier API".to_string(),
        status:  "online".to_string(),
        model:   "Hybrid Quantum-Classical (DenseNet121 + 4-qubit variational circuit)".to_string(),
        classes: CLASS_NAMES.iter().map(|c| c.to_string()).collect(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.slot.status();
    Json(HealthResponse {
        status:        "healthy".to_string(),
        model_loaded:  status.loaded,
        model_loading: status.loading,
        model_error:   status.error,
        device:        DEVICE_LABEL.to_string(),
    })
}

pub async fn predict(
    State(state):  State<AppState>,
    Query(params): Query<PredictParams>,
    mut multipart: Multipart,
) -> Result<Json<DiagnosisReport>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let is_image = field.content_type().is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::BadRequest(INVALID_FILE_TYPE.to_string()));
        }
        tracing::debug!(filename = ?field.file_name(), "Received upload");
        upload = Some(field.bytes().await?);
        break;
    }
    let bytes = upload.ok_or_else(|| ApiError::BadRequest(MISSING_FILE.to_string()))?;

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<DiagnosisReport> {
        let inferencer = state.slot.wait_ready(state.load_timeout)?;
        DiagnoseUseCase::new(&inferencer, state.model_accuracy).execute(&bytes, params.gradcam)
    })
    .await
    .map_err(ApiError::inference)?
    .map_err(|e| ApiError::inference(format!("{e:#}")))?;

    Ok(Json(report))
}
