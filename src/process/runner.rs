use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::models::{non_blank_lines, ProcessingUnit, UnitResult, UnitStatus};

/// Launches a processing unit and reports how it went.
///
/// Implementations never return an error: launch failures, non-zero exits
/// and timeouts are all encoded in [`UnitResult::status`].
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, unit: &ProcessingUnit, extra_args: &[String]) -> UnitResult;
}

/// Runs units as real child processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, unit: &ProcessingUnit, extra_args: &[String]) -> UnitResult {
        let start = Instant::now();
        tracing::info!("Starting unit {} ({} {:?})", unit.name, unit.program, unit.args);

        let mut command = Command::new(&unit.program);
        command
            .args(&unit.args)
            .args(extra_args)
            .current_dir(&unit.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!(
                    "failed to launch `{}` in {}: {e}",
                    unit.program,
                    unit.working_dir.display()
                );
                tracing::warn!("Unit {}: {message}", unit.name);
                return UnitResult::launch_failed(message);
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        // Owned outside the collecting future so a timeout keeps what
        // already arrived.
        let mut out = Vec::new();
        let mut err = Vec::new();

        let collect = async {
            tokio::join!(drain(stdout, &mut out), drain(stderr, &mut err));
            child.wait().await
        };

        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.ok(),
            None => Some(collect.await),
        };

        let stdout = String::from_utf8_lossy(&out).into_owned();
        let stderr = String::from_utf8_lossy(&err).into_owned();

        let Some(status) = status else {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill timed-out unit {}: {e}", unit.name);
            }
            let limit = self.timeout.unwrap_or_default();
            tracing::warn!(
                "Unit {} timed out after {:.1}s. Stderr so far: {}",
                unit.name,
                limit.as_secs_f64(),
                stderr.trim_end()
            );
            return UnitResult {
                status: UnitStatus::TimedOut { after: limit },
                stdout_lines: non_blank_lines(&stdout),
                stderr,
                exit_code: None,
                elapsed: start.elapsed(),
            };
        };

        let elapsed = start.elapsed();

        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!("Failed to wait for unit {}: {e}", unit.name);
                None
            }
        };

        if exit_code == Some(0) {
            tracing::info!(
                "Unit {} complete in {:.1}s",
                unit.name,
                elapsed.as_secs_f64()
            );
            UnitResult {
                status: UnitStatus::Success,
                stdout_lines: non_blank_lines(&stdout),
                stderr,
                exit_code,
                elapsed,
            }
        } else {
            tracing::warn!(
                "Unit {} failed with exit code {:?} after {:.1}s",
                unit.name,
                exit_code,
                elapsed.as_secs_f64()
            );
            UnitResult {
                status: UnitStatus::Failed,
                stdout_lines: non_blank_lines(&stdout),
                stderr,
                exit_code,
                elapsed,
            }
        }
    }
}

/// Read a child stream to EOF into `buf`. Data read before an error or a
/// cancellation stays in `buf`.
async fn drain<R: AsyncRead + Unpin>(stream: Option<R>, buf: &mut Vec<u8>) {
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(buf).await {
            tracing::debug!("Stream read ended early: {e}");
        }
    }
}
