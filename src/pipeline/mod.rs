pub mod artifact;
pub mod ingest;
pub mod query;

pub use ingest::IngestionPipeline;
pub use query::QueryPipeline;

use crate::error::{PipelineError, PipelineResult};
use crate::models::ProcessingUnit;
use crate::process::ProcessRunner;

/// Run one unit and return its stdout lines, or the error describing why it
/// did not succeed.
pub async fn run_unit(
    runner: &dyn ProcessRunner,
    unit: &ProcessingUnit,
    extra_args: &[String],
) -> PipelineResult<Vec<String>> {
    let result = runner.run(unit, extra_args).await;
    if result.is_success() {
        Ok(result.stdout_lines)
    } else {
        Err(PipelineError::from_unit(unit, result))
    }
}
