//! Document extraction endpoint
//!
//! `POST /api/v1/extract` takes a multipart upload, stores it in a scoped
//! temporary file and runs the extraction facade on a blocking worker.

use std::io::Write;
use std::path::Path;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::document::{DocumentExtraction, RawDocument};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the extract router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/extract", post(extract_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Extraction response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub success: bool,
    /// RFC 3339 completion time
    pub timestamp: String,
    pub request_id: String,
    pub filename: String,
    pub result: DocumentExtraction,
}

async fn extract_document(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<ExtractResponse>> {
    let request_id = uuid::Uuid::new_v4().to_string();

    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            tracing::debug!("Skipping multipart field {:?} without filename", field.name());
            continue;
        };

        let data = field.bytes().await?;
        tracing::info!("[{}] Received {} ({} bytes)", request_id, filename, data.len());

        let upload = persist_upload(&state.config().pdf.scratch_dir, &filename, &data)?;
        let result = run_extraction(&state, upload, filename.clone()).await?;

        return Ok(Json(ExtractResponse {
            success: result.is_ok(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
            filename,
            result,
        }));
    }

    tracing::warn!("[{}] No file field found in multipart upload", request_id);
    Err(AppError::BadRequest(
        "No file provided. Send the document as a multipart file field".to_string(),
    ))
}

/// Write the upload to a temporary file, removed when the handle drops
fn persist_upload(scratch_dir: &Path, filename: &str, data: &[u8]) -> Result<NamedTempFile> {
    let suffix = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();

    std::fs::create_dir_all(scratch_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(scratch_dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

/// Extract on a blocking worker under the configured timeout
///
/// The temporary file moves into the worker so it is removed once the
/// worker finishes, even if the request has already timed out.
async fn run_extraction(state: &AppState, upload: NamedTempFile, filename: String) -> Result<DocumentExtraction> {
    let facade = state.facade();
    let timeout = state.config().server.extraction_timeout;

    let task = tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(upload.path())?;
        let doc = RawDocument::detect(bytes, filename);
        let result = facade.extract(&doc);
        drop(upload);
        Ok::<_, std::io::Error>(result)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(e)) => Err(AppError::Internal(format!("Extraction task failed: {}", e))),
        Err(_) => Err(AppError::Timeout(timeout.as_secs())),
    }
}
