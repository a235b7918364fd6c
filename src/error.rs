use axum::http::StatusCode;
use thiserror::Error;

use crate::models::{ProcessingUnit, UnitResult, UnitStatus};

/// Everything that can stop an ingestion or query request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unit `{unit}` could not be launched: {message}")]
    UnitLaunchFailed { unit: String, message: String },

    #[error("Unit `{unit}` exited with code {}. Stderr: {stderr}", display_code(.exit_code))]
    UnitExecutionFailed {
        unit: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Unit `{unit}` timed out after {after_secs}s and was terminated")]
    Timeout { unit: String, after_secs: u64 },

    #[error("Failed to check artifact {path}: {message}")]
    ArtifactProbe { path: String, message: String },

    #[error("Query engine produced no JSON output")]
    NoStructuredOutput { lines: Vec<String> },

    #[error("Invalid JSON response from query engine: {reason}")]
    MalformedOutput {
        line: String,
        lines: Vec<String>,
        reason: String,
    },

    #[error("Ingestion failed recently, retry allowed in {remaining_secs}s. Last error: {last_error}")]
    IngestionCoolingDown {
        remaining_secs: u64,
        last_error: String,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string())
}

impl PipelineError {
    /// Turn a non-successful unit result into the matching error.
    pub fn from_unit(unit: &ProcessingUnit, result: UnitResult) -> Self {
        match result.status {
            UnitStatus::LaunchFailed => Self::UnitLaunchFailed {
                unit: unit.name.clone(),
                message: result.stderr,
            },
            UnitStatus::TimedOut { after } => Self::Timeout {
                unit: unit.name.clone(),
                after_secs: after.as_secs(),
            },
            UnitStatus::Failed | UnitStatus::Success => Self::UnitExecutionFailed {
                unit: unit.name.clone(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name of the unit that failed, if a unit is to blame.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::UnitLaunchFailed { unit, .. }
            | Self::UnitExecutionFailed { unit, .. }
            | Self::Timeout { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// Message safe to show a client when diagnostics are redacted.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::NoStructuredOutput { .. } | Self::MalformedOutput { .. } => {
                "Invalid JSON response from query engine.".to_string()
            }
            Self::IngestionCoolingDown { .. } => {
                "Ingestion recently failed; try again later.".to_string()
            }
            other => match other.unit() {
                Some(unit) => format!("Processing step `{unit}` failed."),
                None => "Internal pipeline error.".to_string(),
            },
        }
    }
}
