pub mod query;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::PipelineError;
use crate::models::ErrorResponse;
use crate::state::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// API routes. Static files and CORS are layered on in `main`.
pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_mb.saturating_mul(1024 * 1024);
    Router::new()
        .route(
            "/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/query", post(query::query))
        .with_state(state)
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// 500 for failures on our side that are not pipeline errors. `detail` is
/// always logged and only returned when diagnostics are exposed.
pub(crate) fn server_error(state: &AppState, public: &str, detail: String) -> ApiError {
    tracing::error!("{public} {detail}");
    let error = if state.config.expose_diagnostics {
        format!("{public} {detail}")
    } else {
        public.to_string()
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error }),
    )
}

/// Map a pipeline error to a response, redacting diagnostics if configured.
pub(crate) fn pipeline_error(state: &AppState, err: PipelineError) -> ApiError {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("{err}");
    }
    let error = if state.config.expose_diagnostics {
        err.to_string()
    } else {
        err.public_message()
    };
    (status, Json(ErrorResponse { error }))
}
