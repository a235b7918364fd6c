use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::{bad_request, pipeline_error, ApiError};
use crate::models::{QueryRequest, QueryResult};
use crate::pipeline::query::QUESTION_REQUIRED;
use crate::state::AppState;

/// POST /query - Answer a question, ingesting first if no index exists yet
pub async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    // An undecodable body is treated like a missing question.
    let question = match body {
        Ok(Json(req)) => req.question.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!("Rejected query body: {rejection}");
            return Err(bad_request(QUESTION_REQUIRED));
        }
    };

    let result = state
        .query
        .answer(&question)
        .await
        .map_err(|e| pipeline_error(&state, e))?;

    Ok(Json(result))
}
