//! Engine status endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::ocr::EngineStatus;
use crate::state::AppState;

/// Upload extensions the extraction endpoint handles
pub const SUPPORTED_FORMATS: &[&str] = &[".pdf", ".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".tif"];

/// Recognition languages
pub const LANGUAGES: &[&str] = &["en", "hi"];

pub fn router() -> Router<AppState> {
    Router::new().route("/ocr/status", get(ocr_status))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrStatusResponse {
    pub engines: Vec<EngineStatus>,
    pub supported_formats: &'static [&'static str],
    pub languages: &'static [&'static str],
    pub preprocessing_enabled: bool,
    pub multi_engine_support: bool,
    /// At least one engine is available
    pub service_ready: bool,
}

async fn ocr_status(State(state): State<AppState>) -> Result<Json<OcrStatusResponse>> {
    // Probing may start an engine for the first time
    let registry = state.registry().clone();
    let engines = tokio::task::spawn_blocking(move || registry.statuses())
        .await
        .map_err(|e| AppError::Internal(format!("Status task failed: {}", e)))?;

    let options = &state.config().preprocess;
    let service_ready = engines.iter().any(|e| e.available);

    Ok(Json(OcrStatusResponse {
        multi_engine_support: engines.len() > 1,
        engines,
        supported_formats: SUPPORTED_FORMATS,
        languages: LANGUAGES,
        preprocessing_enabled: options.grayscale || options.denoise || options.binarize || options.morphology,
        service_ready,
    }))
}
