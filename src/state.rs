use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::{IngestionPipeline, QueryPipeline};
use crate::process::ProcessRunner;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ingestion: Arc<IngestionPipeline>,
    pub query: Arc<QueryPipeline>,
}

impl AppState {
    pub fn new(config: Config, runner: Arc<dyn ProcessRunner>) -> anyhow::Result<Self> {
        // Ensure the upload directory exists
        std::fs::create_dir_all(config.pdf_dir())?;

        let ingestion = Arc::new(IngestionPipeline::new(
            runner.clone(),
            config.ingestion_units(),
            config.ingest_failure_cooldown(),
        ));
        let query = Arc::new(QueryPipeline::new(
            runner,
            ingestion.clone(),
            config.query_unit(),
            config.artifact_path(),
            config.output_framing,
        ));

        Ok(Self {
            config,
            ingestion,
            query,
        })
    }
}
