use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// One external executable step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingUnit {
    /// Stable name used in logs and errors (e.g. "preprocessing")
    pub name: String,
    /// Program to launch (the interpreter)
    pub program: String,
    /// Fixed leading arguments (the script path)
    pub args: Vec<String>,
    /// Working directory of the child process
    pub working_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Success,
    /// Exited non-zero or was killed by a signal
    Failed,
    /// Could not be started at all
    LaunchFailed,
    /// Killed after exceeding the configured timeout
    TimedOut { after: Duration },
}

/// Outcome of one unit invocation.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub status: UnitStatus,
    /// Non-blank stdout lines in emission order
    pub stdout_lines: Vec<String>,
    /// Raw stderr (partial if the unit timed out), or a launch diagnostic
    /// when the unit never started
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl UnitResult {
    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Success
    }

    pub fn success<S: AsRef<str>>(lines: &[S]) -> Self {
        Self {
            status: UnitStatus::Success,
            stdout_lines: lines.iter().map(|l| l.as_ref().to_string()).collect(),
            stderr: String::new(),
            exit_code: Some(0),
            elapsed: Duration::ZERO,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: UnitStatus::Failed,
            stdout_lines: Vec::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            elapsed: Duration::ZERO,
        }
    }

    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self {
            status: UnitStatus::LaunchFailed,
            stdout_lines: Vec::new(),
            stderr: message.into(),
            exit_code: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Split raw stdout into its non-blank lines, preserving order.
pub fn non_blank_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// The query unit's structured answer, passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult(pub Map<String, Value>);

impl QueryResult {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

/// Query request
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: Option<String>,
}

/// Success body for endpoints without a payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
