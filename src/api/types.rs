// ============================================================
// API — Request / Response Types
// ============================================================
// JSON bodies of the HTTP surface. `POST /predict` answers with
// the domain DiagnosisReport directly.

use serde::{Deserialize, Serialize};

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub status:  String,
    pub model:   String,
    pub classes: Vec<String>,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status:        String,
    pub model_loaded:  bool,
    pub model_loading: bool,
    pub model_error:   Option<String>,
    pub device:        String,
}

/// Body of every 4xx / 5xx answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Query string of `POST /predict`.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictParams {
    /// Generate Grad-CAM overlays for every class
    #[serde(default = "default_gradcam")]
    pub gradcam: bool,
}

pub fn default_gradcam() -> bool {
    true
}
