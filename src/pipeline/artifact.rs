use std::io::ErrorKind;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Check whether the index artifact exists. "Not found" is `Ok(false)`;
/// any other I/O failure is surfaced.
pub async fn probe(path: &Path) -> PipelineResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PipelineError::ArtifactProbe {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

/// Like [`probe`], but anything short of a confirmed hit counts as missing
/// so the caller re-ingests rather than getting stuck.
pub async fn exists(path: &Path) -> bool {
    match probe(path).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("{e}; treating artifact as missing");
            false
        }
    }
}
