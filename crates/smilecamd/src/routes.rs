//! HTTP routes.

use crate::error::ApiError;
use crate::smile::DetectResponse;
use crate::state::AppState;
use crate::store::SmileRecord;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let images = ServeDir::new(state.smiles.save_dir());

    Router::new()
        .route("/", get(home))
        .route("/start-camera", post(start_camera))
        .route("/stop-camera", post(stop_camera))
        .route("/get-frame", get(get_frame))
        .route("/detect-smile", get(detect_smile))
        .route("/get-smiles", get(get_smiles))
        .route("/status", get(status))
        .nest_service("/get-image", images)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({ "OK": "HOME" }))
}

async fn start_camera(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let capture = state.capture.clone();
    tokio::task::spawn_blocking(move || capture.start()).await??;
    Ok(Json(json!({ "message": "Camera started" })))
}

async fn stop_camera(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let capture = state.capture.clone();
    tokio::task::spawn_blocking(move || capture.stop()).await?;
    Ok(Json(json!({ "message": "Camera stopped" })))
}

async fn get_frame(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let frame = state.frames.load().ok_or(ApiError::NoFrame)?;
    let quality = state.jpeg_quality;
    let jpeg = tokio::task::spawn_blocking(move || frame.encode_jpeg(quality)).await??;
    Ok((StatusCode::OK, [("content-type", "image/jpeg")], jpeg))
}

async fn detect_smile(State(state): State<AppState>) -> Result<Json<DetectResponse>, ApiError> {
    let smiles = state.smiles.clone();
    let response = tokio::task::spawn_blocking(move || smiles.detect()).await??;
    Ok(Json(response))
}

async fn get_smiles(State(state): State<AppState>) -> Result<Json<Vec<SmileRecord>>, ApiError> {
    let store = state.store.clone();
    let rows = tokio::task::spawn_blocking(move || store.list()).await??;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    camera_active: bool,
    frame_available: bool,
    smiles_recorded: u64,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let store = state.store.clone();
    let smiles_recorded = tokio::task::spawn_blocking(move || store.count()).await??;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        camera_active: state.capture.is_active(),
        frame_available: !state.frames.is_empty(),
        smiles_recorded,
    }))
}
