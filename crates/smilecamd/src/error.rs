//! HTTP error mapping.

use crate::capture::CaptureError;
use crate::smile::SmileError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use smilecam_hw::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to open camera")]
    CameraUnavailable(#[source] CaptureError),

    #[error("No frame captured yet")]
    NoFrame,

    #[error("{0}")]
    Detection(#[from] SmileError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Encode(#[from] FrameError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Open(_) => ApiError::CameraUnavailable(e),
            CaptureError::Spawn(io) => ApiError::Internal(format!("capture thread: {io}")),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let message = self.to_string();

        match &self {
            ApiError::CameraUnavailable(cause) => {
                tracing::error!(status = %status, cause = %cause, "{message}")
            }
            _ => tracing::error!(status = %status, message = %message, "request failed"),
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
