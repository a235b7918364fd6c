use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{run_unit, IngestionPipeline};
use crate::config::OutputFraming;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ProcessingUnit, QueryResult};
use crate::process::ProcessRunner;

pub const QUESTION_REQUIRED: &str = "Question is required.";

/// Answers questions by running the query unit against the index,
/// ingesting first when the index is missing.
///
/// ```text
/// Start → ProbeArtifact → [IngestIfMissing] → RunQueryUnit → ParseOutput → Done
///                 └──────────────┴──────────────────┴─────────────┴──→ Failed
/// ```
pub struct QueryPipeline {
    runner: Arc<dyn ProcessRunner>,
    ingestion: Arc<IngestionPipeline>,
    query_unit: ProcessingUnit,
    artifact_path: PathBuf,
    framing: OutputFraming,
}

impl QueryPipeline {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ingestion: Arc<IngestionPipeline>,
        query_unit: ProcessingUnit,
        artifact_path: PathBuf,
        framing: OutputFraming,
    ) -> Self {
        Self {
            runner,
            ingestion,
            query_unit,
            artifact_path,
            framing,
        }
    }

    pub async fn answer(&self, question: &str) -> PipelineResult<QueryResult> {
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidInput(QUESTION_REQUIRED.to_string()));
        }

        self.ingestion.ensure_artifact(&self.artifact_path).await?;

        let lines = {
            let _reader = self.ingestion.reader().await;
            run_unit(
                self.runner.as_ref(),
                &self.query_unit,
                &[question.to_string()],
            )
            .await?
        };

        tracing::debug!("Raw query engine output: {:?}", lines);
        parse_structured_output(lines, self.framing)
    }
}

/// Locate the structured record in the query unit's stdout and parse it.
pub fn parse_structured_output(
    lines: Vec<String>,
    framing: OutputFraming,
) -> PipelineResult<QueryResult> {
    let candidate = match framing {
        OutputFraming::Heuristic => lines
            .iter()
            .rev()
            .find(|line| line.trim().starts_with('{')),
        OutputFraming::LastLine => lines.last().filter(|line| line.trim().starts_with('{')),
    };

    let Some(line) = candidate else {
        tracing::debug!("No JSON line in query engine output: {:?}", lines);
        return Err(PipelineError::NoStructuredOutput { lines });
    };

    match serde_json::from_str::<Map<String, Value>>(line.trim()) {
        Ok(record) => Ok(QueryResult(record)),
        Err(e) => {
            tracing::debug!(
                "Failed to parse query engine output as JSON: {e}. Raw output: {:?}",
                lines
            );
            Err(PipelineError::MalformedOutput {
                line: line.clone(),
                reason: e.to_string(),
                lines,
            })
        }
    }
}
