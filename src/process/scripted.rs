use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::runner::ProcessRunner;
use crate::models::{ProcessingUnit, UnitResult};

/// A recorded call to [`ScriptedRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub unit: String,
    pub extra_args: Vec<String>,
}

/// Pauses a scripted unit mid-run until the test lets it finish.
#[derive(Debug, Default)]
pub struct Hold {
    entered: Notify,
    release: Notify,
}

impl Hold {
    /// Wait until the held unit has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held unit complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// In-memory [`ProcessRunner`] that replays canned results per unit name and
/// records every launch. Units without a queued result succeed silently.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<UnitResult>>>,
    creates: Mutex<HashMap<String, PathBuf>>,
    holds: Mutex<HashMap<String, Arc<Hold>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next invocation of `unit`.
    pub fn respond(&self, unit: &str, result: UnitResult) {
        self.responses
            .lock()
            .entry(unit.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn succeed_with(&self, unit: &str, lines: &[&str]) {
        self.respond(unit, UnitResult::success(lines));
    }

    pub fn fail_with(&self, unit: &str, exit_code: i32, stderr: &str) {
        self.respond(unit, UnitResult::failure(exit_code, stderr));
    }

    /// Write `path` whenever `unit` succeeds, standing in for the side
    /// effect a real unit has on disk.
    pub fn creates(&self, unit: &str, path: impl Into<PathBuf>) {
        self.creates.lock().insert(unit.to_string(), path.into());
    }

    /// Block the next run of `unit` after it is recorded and before it
    /// produces its result or side effect.
    pub fn hold(&self, unit: &str) -> Arc<Hold> {
        let hold = Arc::new(Hold::default());
        self.holds.lock().insert(unit.to_string(), hold.clone());
        hold
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    /// Unit names in launch order.
    pub fn launched_units(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.unit.clone()).collect()
    }

    pub fn launch_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, unit: &ProcessingUnit, extra_args: &[String]) -> UnitResult {
        self.calls.lock().push(Invocation {
            unit: unit.name.clone(),
            extra_args: extra_args.to_vec(),
        });

        let hold = self.holds.lock().remove(&unit.name);
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }

        let result = self
            .responses
            .lock()
            .get_mut(&unit.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| UnitResult::success::<&str>(&[]));

        if result.is_success() {
            let target = self.creates.lock().get(&unit.name).cloned();
            if let Some(path) = target {
                if let Err(e) = tokio::fs::write(&path, b"").await {
                    tracing::warn!("Scripted unit {} could not create {}: {e}", unit.name, path.display());
                }
            }
        }

        result
    }
}
