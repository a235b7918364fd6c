use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::ProcessingUnit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Project root; `pdfs/`, `public/` and `python-scripts/` live under it
    pub base_dir: PathBuf,
    /// Override for the upload directory (defaults to `<base_dir>/pdfs`)
    pub pdf_dir: Option<PathBuf>,
    /// Override for the static frontend directory (defaults to `<base_dir>/public`)
    pub public_dir: Option<PathBuf>,
    /// Override for the scripts directory (defaults to `<base_dir>/python-scripts`)
    pub scripts_dir: Option<PathBuf>,
    /// Interpreter every processing unit is launched with
    pub interpreter: String,
    /// Script names for each processing unit
    pub scripts: ScriptConfig,
    /// File name of the index artifact, relative to the scripts directory
    pub artifact_name: String,
    /// Per-unit timeout in seconds (0 = wait forever)
    pub unit_timeout_secs: u64,
    /// Maximum number of files accepted by one upload
    pub max_upload_files: usize,
    /// Maximum upload body size in MB
    pub max_upload_mb: usize,
    /// After a failed query-triggered ingestion, fail fast for this many
    /// seconds instead of re-running it (0 = always re-run)
    pub ingest_failure_cooldown_secs: u64,
    /// How the query unit's structured answer is located in its output
    pub output_framing: OutputFraming,
    /// Include unit stderr and parse diagnostics in HTTP error bodies
    pub expose_diagnostics: bool,
    /// Attach a permissive CORS layer
    pub allow_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub extraction: String,
    pub preprocessing: String,
    pub embedding: String,
    pub query: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            extraction: "pdf_to_text.py".to_string(),
            preprocessing: "preprocess_text.py".to_string(),
            embedding: "create_embeddings.py".to_string(),
            query: "query_engine.py".to_string(),
        }
    }
}

/// Strategy for picking the structured record out of the query unit's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFraming {
    /// Last line (scanning backwards) whose trimmed text starts with `{`.
    #[default]
    Heuristic,
    /// Only the final non-blank line may carry the record.
    LastLine,
}

impl OutputFraming {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Some(Self::Heuristic),
            "last-line" | "last_line" | "lastline" => Some(Self::LastLine),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            base_dir: PathBuf::from("."),
            pdf_dir: None,
            public_dir: None,
            scripts_dir: None,
            interpreter: "python".to_string(),
            scripts: ScriptConfig::default(),
            artifact_name: "faiss_index.index".to_string(),
            unit_timeout_secs: 900,
            max_upload_files: 10,
            max_upload_mb: 100,
            ingest_failure_cooldown_secs: 0,
            output_framing: OutputFraming::Heuristic,
            expose_diagnostics: true,
            allow_cors: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PDF_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("PDF_RAG_BASE_DIR") {
            config.base_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PDF_RAG_PDF_DIR") {
            config.pdf_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("PDF_RAG_PUBLIC_DIR") {
            config.public_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("PDF_RAG_SCRIPTS_DIR") {
            config.scripts_dir = Some(PathBuf::from(dir));
        }
        if let Ok(interpreter) = std::env::var("PDF_RAG_INTERPRETER") {
            config.interpreter = interpreter;
        }

        // Script names
        if let Ok(name) = std::env::var("PDF_RAG_EXTRACTION_SCRIPT") {
            config.scripts.extraction = name;
        }
        if let Ok(name) = std::env::var("PDF_RAG_PREPROCESSING_SCRIPT") {
            config.scripts.preprocessing = name;
        }
        if let Ok(name) = std::env::var("PDF_RAG_EMBEDDING_SCRIPT") {
            config.scripts.embedding = name;
        }
        if let Ok(name) = std::env::var("PDF_RAG_QUERY_SCRIPT") {
            config.scripts.query = name;
        }
        if let Ok(name) = std::env::var("PDF_RAG_ARTIFACT_NAME") {
            config.artifact_name = name;
        }

        if let Ok(val) = std::env::var("PDF_RAG_UNIT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.unit_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("PDF_RAG_MAX_UPLOAD_FILES") {
            if let Ok(v) = val.parse() {
                config.max_upload_files = v;
            }
        }
        if let Ok(val) = std::env::var("PDF_RAG_MAX_UPLOAD_MB") {
            if let Ok(v) = val.parse() {
                config.max_upload_mb = v;
            }
        }
        if let Ok(val) = std::env::var("PDF_RAG_INGEST_FAILURE_COOLDOWN_SECS") {
            if let Ok(v) = val.parse() {
                config.ingest_failure_cooldown_secs = v;
            }
        }
        if let Ok(val) = std::env::var("PDF_RAG_OUTPUT_FRAMING") {
            match OutputFraming::parse(&val) {
                Some(framing) => config.output_framing = framing,
                None => tracing::warn!("Ignoring unknown PDF_RAG_OUTPUT_FRAMING value: {val}"),
            }
        }
        if let Ok(val) = std::env::var("PDF_RAG_EXPOSE_DIAGNOSTICS") {
            if let Some(v) = parse_flag(&val) {
                config.expose_diagnostics = v;
            }
        }
        if let Ok(val) = std::env::var("PDF_RAG_ALLOW_CORS") {
            if let Some(v) = parse_flag(&val) {
                config.allow_cors = v;
            }
        }

        config
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.pdf_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("pdfs"))
    }

    pub fn public_dir(&self) -> PathBuf {
        self.public_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("public"))
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.scripts_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("python-scripts"))
    }

    /// The index file whose existence means ingestion has completed once.
    pub fn artifact_path(&self) -> PathBuf {
        self.scripts_dir().join(&self.artifact_name)
    }

    pub fn unit_timeout(&self) -> Option<Duration> {
        (self.unit_timeout_secs > 0).then(|| Duration::from_secs(self.unit_timeout_secs))
    }

    pub fn ingest_failure_cooldown(&self) -> Option<Duration> {
        (self.ingest_failure_cooldown_secs > 0)
            .then(|| Duration::from_secs(self.ingest_failure_cooldown_secs))
    }

    /// Extraction, preprocessing and embedding, in execution order.
    pub fn ingestion_units(&self) -> Vec<ProcessingUnit> {
        vec![
            self.script_unit("extraction", &self.scripts.extraction),
            self.script_unit("preprocessing", &self.scripts.preprocessing),
            self.script_unit("embedding", &self.scripts.embedding),
        ]
    }

    pub fn query_unit(&self) -> ProcessingUnit {
        self.script_unit("query", &self.scripts.query)
    }

    fn script_unit(&self, name: &str, script: &str) -> ProcessingUnit {
        let scripts_dir = self.scripts_dir();
        ProcessingUnit {
            name: name.to_string(),
            program: self.interpreter.clone(),
            args: vec![scripts_dir.join(script).to_string_lossy().to_string()],
            working_dir: scripts_dir,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
