// ============================================================
// API — HTTP Surface (axum)
// ============================================================
// Thin shell over the application layer. The model is loaded
// by a background thread into a shared ModelSlot; handlers wait
// on that slot with a bounded timeout.
//
//   request ──▶ CORS ──▶ TraceLayer ──▶ body limit ──▶ handler
//
// What's in this module:
//
//   handlers.rs — GET /, GET /health, POST /predict
//   error.rs    — ApiError → {"detail": ...} with status code
//   types.rs    — JSON request / response bodies

pub mod error;
pub mod handlers;
pub mod types;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::infra::model_slot::{ModelSlot, DEFAULT_LOAD_TIMEOUT};
use crate::ml::inferencer::Inferencer;

/// Reported held-out accuracy of the published checkpoint.
pub const DEFAULT_MODEL_ACCURACY: f64 = 0.8830;

pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host:             String,
    pub port:             u16,
    pub model_accuracy:   f64,
    pub load_timeout:     Duration,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host:             "0.0.0.0".to_string(),
            port:             8000,
            model_accuracy:   DEFAULT_MODEL_ACCURACY,
            load_timeout:     DEFAULT_LOAD_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

/// Shared across handlers; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub slot:           Arc<ModelSlot<Inferencer>>,
    pub model_accuracy: f64,
    pub load_timeout:   Duration,
}

impl AppState {
    pub fn new(slot: Arc<ModelSlot<Inferencer>>, config: &ServerConfig) -> Self {
        Self {
            slot,
            model_accuracy: config.model_accuracy,
            load_timeout:   config.load_timeout,
        }
    }
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: ServerConfig, slot: Arc<ModelSlot<Inferencer>>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let app = create_router(AppState::new(slot, &config), config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;

    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ErrorResponse, HealthResponse, RootResponse};
    use crate::data::visualize;
    use crate::ml::model::tests::tiny_config;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::Response,
    };
    use base64::{engine::general_purpose, Engine as _};
    use burn::backend::ndarray::NdArrayDevice;
    use image::{GrayImage, Luma, RgbImage};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    const BOUNDARY: &str = "mri-test-boundary";

    fn tiny_inferencer() -> Inferencer {
        let device = NdArrayDevice::default();
        Inferencer::from_model(tiny_config().init(&device), device).unwrap()
    }

    fn ready_slot() -> Arc<ModelSlot<Inferencer>> {
        let slot = Arc::new(ModelSlot::new());
        slot.begin_loading();
        slot.finish(Ok(tiny_inferencer()));
        slot
    }

    fn router(slot: Arc<ModelSlot<Inferencer>>) -> Router {
        let config = ServerConfig { load_timeout: Duration::from_millis(50), ..ServerConfig::default() };
        create_router(AppState::new(slot, &config), config.max_upload_bytes)
    }

    fn gray_png() -> Vec<u8> {
        let gray = image::DynamicImage::ImageLuma8(GrayImage::from_pixel(224, 224, Luma([128])));
        visualize::encode_png(&gray.to_rgb8()).unwrap()
    }

    fn multipart_request(uri: &str, content_type: &str, payload: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"scan.png\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get_health(slot: Arc<ModelSlot<Inferencer>>) -> HealthResponse {
        let request  = Request::get("/health").body(Body::empty()).unwrap();
        let response = router(slot).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json(response).await
    }

    #[tokio::test]
    async fn test_root_lists_classes() {
        let request  = Request::get("/").body(Body::empty()).unwrap();
        let response = router(Arc::new(ModelSlot::new())).oneshot(request).await.unwrap();
        let body: RootResponse = json(response).await;
        assert_eq!(body.status, "online");
        assert_eq!(body.classes, vec!["glioma", "meningioma", "no_tumor", "pituitary"]);
    }

    #[tokio::test]
    async fn test_health_while_loading() {
        let slot = Arc::new(ModelSlot::new());
        slot.begin_loading();
        let health = get_health(slot).await;
        assert!(health.model_loading);
        assert!(!health.model_loaded);
        assert_eq!(health.device, "cpu");
    }

    #[tokio::test]
    async fn test_health_after_load() {
        let health = get_health(ready_slot()).await;
        assert!(health.model_loaded);
        assert!(!health.model_loading);
        assert_eq!(health.model_error, None);
    }

    #[tokio::test]
    async fn test_non_image_upload_is_rejected() {
        let request  = multipart_request("/predict", "text/plain", b"hello");
        let response = router(ready_slot()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.detail, "Invalid file type. Please upload a JPG or PNG image.");
    }

    #[tokio::test]
    async fn test_model_not_ready_is_reported_as_inference_failure() {
        let slot = Arc::new(ModelSlot::new());
        slot.begin_loading();
        let request  = multipart_request("/predict", "image/png", &gray_png());
        let response = router(slot).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.detail, "Inference failed: Model loading timed out");
    }

    #[tokio::test]
    async fn test_failed_load_is_reported() {
        let slot = Arc::new(ModelSlot::<Inferencer>::new());
        slot.begin_loading();
        slot.finish(Err(anyhow::anyhow!("checkpoint missing")));
        let request  = multipart_request("/predict", "image/png", &gray_png());
        let response = router(slot).oneshot(request).await.unwrap();
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.detail, "Inference failed: Model failed to load: checkpoint missing");
    }

    #[tokio::test]
    async fn test_predict_gray_image_end_to_end() {
        let request  = multipart_request("/predict", "image/png", &gray_png());
        let response = router(ready_slot()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = json(response).await;
        let probs = body["probabilities"].as_object().unwrap();
        assert_eq!(probs.len(), 4);
        let total: f64 = probs.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-4);

        let maps = body["gradcam_images"].as_object().unwrap();
        let keys: Vec<&str> = maps.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for class in ["glioma", "meningioma", "no_tumor", "pituitary"] {
            let encoded = maps[class].as_str().unwrap();
            let png     = general_purpose::STANDARD.decode(encoded).unwrap();
            let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
            assert_eq!(decoded.dimensions(), (224, 224));
        }

        let uploaded = general_purpose::STANDARD
            .decode(body["uploaded_image"].as_str().unwrap())
            .unwrap();
        let uploaded: RgbImage = image::load_from_memory(&uploaded).unwrap().to_rgb8();
        assert_eq!(uploaded.dimensions(), (224, 224));
        assert!(body["risk_level"]["level"].is_string());
        assert_eq!(body["model_accuracy"].as_f64(), Some(DEFAULT_MODEL_ACCURACY));
    }

    #[tokio::test]
    async fn test_gradcam_can_be_skipped() {
        let request  = multipart_request("/predict?gradcam=false", "image/png", &gray_png());
        let response = router(ready_slot()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["gradcam_images"], serde_json::json!({}));
    }
}
