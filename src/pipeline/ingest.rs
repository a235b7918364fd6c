use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{artifact, run_unit};
use crate::error::{PipelineError, PipelineResult};
use crate::models::ProcessingUnit;
use crate::process::ProcessRunner;

/// Runs extraction, preprocessing and embedding in order, stopping at the
/// first failure.
///
/// Side effects of units that already succeeded stay on disk when a later
/// unit fails; nothing is rolled back. Only one ingestion runs at a time:
/// the gate's write side is held for the whole run, and query units take
/// the read side so they never observe a half-written index.
pub struct IngestionPipeline {
    runner: Arc<dyn ProcessRunner>,
    units: Vec<ProcessingUnit>,
    gate: RwLock<()>,
    waiting: AtomicUsize,
    failure_cooldown: Option<Duration>,
    /// Last failed query-triggered ingestion, for the cooldown.
    last_failure: Mutex<Option<RecordedFailure>>,
}

#[derive(Debug, Clone)]
struct RecordedFailure {
    at: Instant,
    message: String,
}

impl IngestionPipeline {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        units: Vec<ProcessingUnit>,
        failure_cooldown: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            units,
            gate: RwLock::new(()),
            waiting: AtomicUsize::new(0),
            failure_cooldown,
            last_failure: Mutex::new(None),
        }
    }

    /// Run every ingestion unit unconditionally (the upload path).
    ///
    /// A failure here is not recorded for the cooldown; only
    /// query-triggered ingestion is throttled.
    pub async fn run(&self) -> PipelineResult<()> {
        let _guard = self.writer().await;
        let outcome = self.run_units().await;
        if outcome.is_ok() {
            *self.last_failure.lock() = None;
        }
        outcome
    }

    /// Make sure the index artifact exists, ingesting first if it does not
    /// (the query path).
    ///
    /// Every call that finds the artifact missing re-runs the whole pipeline,
    /// even if the previous attempt failed, unless a failure cooldown is
    /// configured.
    pub async fn ensure_artifact(&self, artifact_path: &Path) -> PipelineResult<()> {
        if artifact::exists(artifact_path).await {
            return Ok(());
        }

        self.check_cooldown()?;

        let _guard = self.writer().await;
        // An ingestion we queued behind may already have produced it.
        if artifact::exists(artifact_path).await {
            tracing::info!(
                "Index {} appeared while waiting for ingestion gate",
                artifact_path.display()
            );
            return Ok(());
        }

        tracing::info!(
            "Index not found at {}. Running ingestion pipeline before processing query...",
            artifact_path.display()
        );
        let outcome = self.run_units().await;
        *self.last_failure.lock() = outcome.as_ref().err().map(|e| RecordedFailure {
            at: Instant::now(),
            message: e.to_string(),
        });
        outcome
    }

    /// Shared access for readers of the index (the query unit).
    pub async fn reader(&self) -> RwLockReadGuard<'_, ()> {
        if let Ok(guard) = self.gate.try_read() {
            return guard;
        }
        tracing::info!("Query waiting for running ingestion to finish");
        let _queued = Queued::new(&self.waiting);
        self.gate.read().await
    }

    /// Number of callers currently queued on the ingestion gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    async fn writer(&self) -> RwLockWriteGuard<'_, ()> {
        if let Ok(guard) = self.gate.try_write() {
            return guard;
        }
        tracing::info!("Ingestion already in progress, waiting for ingestion gate");
        let _queued = Queued::new(&self.waiting);
        self.gate.write().await
    }

    async fn run_units(&self) -> PipelineResult<()> {
        let start = Instant::now();
        let outcome = self.run_in_order().await;

        match &outcome {
            Ok(()) => tracing::info!(
                "Ingestion pipeline complete in {:.1}s",
                start.elapsed().as_secs_f64()
            ),
            Err(e) => tracing::warn!("Ingestion pipeline failed: {e}"),
        }

        outcome
    }

    async fn run_in_order(&self) -> PipelineResult<()> {
        for unit in &self.units {
            run_unit(self.runner.as_ref(), unit, &[]).await?;
            tracing::info!("Ingestion step {} complete", unit.name);
        }
        Ok(())
    }

    fn check_cooldown(&self) -> PipelineResult<()> {
        let Some(cooldown) = self.failure_cooldown else {
            return Ok(());
        };
        let last = self.last_failure.lock().clone();
        match last {
            Some(failure) if failure.at.elapsed() < cooldown => {
                let remaining = cooldown.saturating_sub(failure.at.elapsed());
                Err(PipelineError::IngestionCoolingDown {
                    remaining_secs: remaining.as_secs().max(1),
                    last_error: failure.message,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Counts a caller as queued until it is dropped, including when the
/// waiting future is cancelled.
struct Queued<'a>(&'a AtomicUsize);

impl<'a> Queued<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
