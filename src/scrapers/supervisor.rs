//! Subprocess retry supervisor for the out-of-process browser runners.
//!
//! Each attempt launches the runner binary with a private temp file for the
//! JSON result, enforces a wall-clock timeout with TERM-then-KILL escalation,
//! and maps the exit code onto the retry policy: transient failures back off
//! exponentially, rate limits take a fixed extended cooldown, permanent
//! failures stop immediately.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::models::{dedup_records, PropertyRecord, RetryAttempt, ScrapeResult};
use crate::outcome::ExitOutcome;
use crate::scrapers::backoff_delay;
use crate::utils::error::AppError;

/// One runner invocation: the binary, its arguments, and its budget.
#[derive(Debug, Clone)]
pub struct RunnerSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Wall-clock ceiling for a single attempt.
    pub timeout: Duration,
    /// Human-readable name used in log lines and failure messages,
    /// e.g. "AL scraper".
    pub label: String,
}

/// A finished supervised run with its per-attempt history.
#[derive(Debug)]
pub struct SupervisedRun {
    pub result: ScrapeResult,
    pub attempts: Vec<RetryAttempt>,
}

/// How one attempt ended, before retry policy is applied.
enum AttemptEnd {
    Completed(Vec<PropertyRecord>),
    Failed { outcome: ExitOutcome, error: String },
}

/// How long to wait for remaining stderr output after the runner exits.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

pub struct Supervisor {
    retry: RetryConfig,
}

impl Supervisor {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    /// Run the runner to completion under the retry policy.
    pub async fn run(&self, spec: &RunnerSpec) -> ScrapeResult {
        self.run_detailed(spec).await.result
    }

    /// Like [`run`](Self::run), but keeps the attempt history for callers
    /// that need to inspect delays and outcomes.
    pub async fn run_detailed(&self, spec: &RunnerSpec) -> SupervisedRun {
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts {
            info!(
                "{}: attempt {}/{}",
                spec.label,
                attempt + 1,
                self.retry.max_attempts
            );

            match self.run_attempt(spec).await {
                AttemptEnd::Completed(records) => {
                    info!("{}: completed with {} records", spec.label, records.len());
                    attempts.push(RetryAttempt {
                        attempt,
                        delay: Duration::ZERO,
                        outcome: ExitOutcome::Success,
                    });
                    return SupervisedRun {
                        result: ScrapeResult::ok(records),
                        attempts,
                    };
                }
                AttemptEnd::Failed { outcome, error } => {
                    last_error = error;
                    let is_last = attempt + 1 == self.retry.max_attempts;

                    if outcome == ExitOutcome::Permanent {
                        warn!("{}: permanent failure, not retrying: {last_error}", spec.label);
                        attempts.push(RetryAttempt {
                            attempt,
                            delay: Duration::ZERO,
                            outcome,
                        });
                        break;
                    }

                    let delay = if is_last {
                        Duration::ZERO
                    } else {
                        self.delay_for(outcome, attempt)
                    };
                    attempts.push(RetryAttempt { attempt, delay, outcome });

                    if !is_last {
                        warn!(
                            "{}: {last_error}; retrying in {:.1}s",
                            spec.label,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let message = format!(
            "{} failed after {} attempts: {last_error}",
            spec.label,
            attempts.len()
        );
        warn!("{message}");
        SupervisedRun {
            result: ScrapeResult::failed(message),
            attempts,
        }
    }

    /// Sleep before the next attempt, chosen by the failure class.
    fn delay_for(&self, outcome: ExitOutcome, attempt: u32) -> Duration {
        match outcome {
            ExitOutcome::RateLimited => self.retry.rate_limit_delay(),
            _ => backoff_delay(attempt, self.retry.base_delay(), self.retry.max_delay()),
        }
    }

    async fn run_attempt(&self, spec: &RunnerSpec) -> AttemptEnd {
        let result_file = TempResultFile::new();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .arg("--json-output")
            .arg(result_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return AttemptEnd::Failed {
                    outcome: ExitOutcome::Transient,
                    error: format!("failed to launch {}: {e}", spec.program.display()),
                }
            }
        };

        // Stderr is read incrementally into a shared buffer: a grandchild
        // (e.g. a browser process) can inherit the pipe and keep it open
        // long after the runner itself has exited.
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_task = child.stderr.take().map(|pipe| {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Ok(mut buf) = buf.lock() {
                        buf.push_str(&line);
                        buf.push('\n');
                    }
                }
            })
        });

        let status = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return AttemptEnd::Failed {
                    outcome: ExitOutcome::Transient,
                    error: format!("failed waiting on runner: {e}"),
                }
            }
            Err(_) => {
                self.escalate_kill(&mut child, &spec.label).await;
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return AttemptEnd::Failed {
                    outcome: ExitOutcome::Transient,
                    error: format!("timed out after {:.1}s", spec.timeout.as_secs_f64()),
                };
            }
        };

        if let Some(mut task) = stderr_task {
            if tokio::time::timeout(STDERR_DRAIN, &mut task).await.is_err() {
                task.abort();
            }
        }
        let stderr_text = stderr_buf
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();

        match ExitOutcome::from_code(status.code()) {
            ExitOutcome::Success => match read_records(result_file.path()) {
                Ok(records) => AttemptEnd::Completed(records),
                Err(e) => AttemptEnd::Failed {
                    outcome: ExitOutcome::Transient,
                    error: format!("runner exited cleanly but result file was unreadable: {e}"),
                },
            },
            outcome => AttemptEnd::Failed {
                outcome,
                error: stderr_tail(&stderr_text).unwrap_or_else(|| {
                    format!("exit code {}", status.code().map_or_else(|| "none".to_string(), |c| c.to_string()))
                }),
            },
        }
    }

    /// Graceful shutdown: SIGTERM, wait out the grace period, then SIGKILL.
    async fn escalate_kill(&self, child: &mut Child, label: &str) {
        if let Some(pid) = child.id() {
            debug!("{label}: timed out, sending SIGTERM to pid {pid}");
            let _ = Command::new("kill").arg(pid.to_string()).status().await;

            if tokio::time::timeout(self.retry.term_grace(), child.wait())
                .await
                .is_ok()
            {
                return;
            }
        }

        warn!("{label}: runner ignored SIGTERM, killing");
        let _ = child.kill().await;
    }
}

/// Private result path for one attempt, removed when the attempt ends
/// whatever the outcome.
struct TempResultFile {
    path: PathBuf,
}

impl TempResultFile {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("deedscout_result_{}.json", Uuid::new_v4()));
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempResultFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_records(path: &Path) -> Result<Vec<PropertyRecord>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let records: Vec<PropertyRecord> = serde_json::from_str(&raw)?;
    Ok(dedup_records(records))
}

/// Last non-empty stderr line, the part worth surfacing to the operator.
fn stderr_tail(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
