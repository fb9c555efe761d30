// ============================================================
// API — Error Mapping
// ============================================================
// Every failure leaves the server as `{"detail": "..."}`:
//   400 — bad upload (wrong content type, no file)
//   4xx — malformed multipart body (status chosen by axum)
//   500 — anything after validation, prefixed "Inference failed: "

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::types::ErrorResponse;

pub const INVALID_FILE_TYPE: &str = "Invalid file type. Please upload a JPG or PNG image.";
pub const MISSING_FILE:      &str = "No file uploaded. Send the image in the 'file' field.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl ApiError {
    pub fn inference(err: impl std::fmt::Display) -> Self {
        ApiError::Inference(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e)  => e.status(),
            ApiError::Inference(_)  => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::warn!(%status, "{self}");
        }
        (status, Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}
