use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::Json;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::{bad_request, pipeline_error, server_error, ApiError};
use crate::models::MessageResponse;
use crate::state::AppState;

/// Multipart field that carries the uploaded PDFs.
pub const UPLOAD_FIELD: &str = "pdfs";

/// POST /upload - Store uploaded PDFs, then run the full ingestion pipeline
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;
    let pdf_dir = state.config.pdf_dir();
    let max_files = state.config.max_upload_files;
    let mut saved = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart field: {e}")))?
    {
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            // Plain form values are ignored.
            continue;
        };

        if field.name() != Some(UPLOAD_FIELD) {
            return Err(bad_request(format!(
                "Unexpected file field `{}`; upload files under `{UPLOAD_FIELD}`",
                field.name().unwrap_or("")
            )));
        }
        if saved.len() >= max_files {
            return Err(bad_request(format!(
                "Too many files: at most {max_files} per upload"
            )));
        }

        let Some(filename) = sanitize_filename(&raw_name) else {
            return Err(bad_request(format!("Invalid file name: {raw_name:?}")));
        };

        let target = pdf_dir.join(&filename);
        let bytes = save_field(field, &target).await.map_err(|e| match e {
            SaveError::Read(e) => bad_request(format!("Failed to read {filename}: {e}")),
            SaveError::Write(e) => server_error(
                &state,
                "Failed to store uploaded file.",
                format!("{}: {e}", target.display()),
            ),
        })?;
        tracing::info!("Received file {filename} ({bytes} bytes)");
        saved.push(filename);
    }

    tracing::info!("Received {} PDF file(s): {:?}", saved.len(), saved);

    state
        .ingestion
        .run()
        .await
        .map_err(|e| pipeline_error(&state, e))?;

    Ok(Json(MessageResponse {
        message: "File processed, you may now ask queries.".to_string(),
    }))
}

/// Why a field could not be saved: the client's body or our disk.
enum SaveError {
    Read(MultipartError),
    Write(std::io::Error),
}

/// Stream one multipart field to `target`, returning the number of bytes.
async fn save_field(mut field: Field<'_>, target: &Path) -> Result<u64, SaveError> {
    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(SaveError::Write)?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(SaveError::Read)? {
        file.write_all(&chunk).await.map_err(SaveError::Write)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(SaveError::Write)?;
    Ok(written)
}

/// Keep only the final path component of a client-supplied file name.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
