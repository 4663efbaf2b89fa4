//! Supervisor integration tests using shell scripts as stand-in runners.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use deedscout::config::RetryConfig;
use deedscout::outcome::ExitOutcome;
use deedscout::scrapers::supervisor::{RunnerSpec, Supervisor};
use tempfile::TempDir;

const RECORDS_JSON: &str = r#"[
  {"parcel_id":"P-1","county":"Baldwin","state":"AL","owner_name":"DOE JOHN",
   "amount":1200.0,"acreage":null,"description":"LOT 1","sale_type":"tax_lien",
   "year_sold":"2024","auction_date":null,"data_source":"alabama_dor",
   "auction_platform":"ADOR Search","scraped_at":"2026-08-23T00:00:00Z"},
  {"parcel_id":"P-2","county":"Baldwin","state":"AL","owner_name":null,
   "amount":800.5,"acreage":1.5,"description":"LOT 2","sale_type":"tax_lien",
   "year_sold":"2024","auction_date":null,"data_source":"alabama_dor",
   "auction_platform":"ADOR Search","scraped_at":"2026-08-23T00:00:00Z"},
  {"parcel_id":"P-3","county":"Baldwin","state":"AL","owner_name":null,
   "amount":0.0,"acreage":null,"description":"LOT 3","sale_type":"tax_lien",
   "year_sold":"2023","auction_date":null,"data_source":"alabama_dor",
   "auction_platform":"ADOR Search","scraped_at":"2026-08-23T00:00:00Z"}
]"#;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 100,
        rate_limit_delay_ms: 50,
        term_grace_ms: 200,
    }
}

/// Write an executable sh script into `dir`. Scripts receive the runner CLI
/// contract: `<county> --max-pages N --json-output <path>`, so the result
/// path is always the last argument.
fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    let script = format!("#!/bin/sh\nfor a in \"$@\"; do out=\"$a\"; done\n{body}\n");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn spec(program: PathBuf, timeout_ms: u64) -> RunnerSpec {
    RunnerSpec {
        program,
        args: vec!["Baldwin".to_string(), "--max-pages".to_string(), "5".to_string()],
        timeout: Duration::from_millis(timeout_ms),
        label: "AL scraper".to_string(),
    }
}

#[tokio::test]
async fn transient_failures_retry_then_succeed() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("attempts");
    let records_file = dir.path().join("records.json");
    std::fs::write(&records_file, RECORDS_JSON).unwrap();

    // Fails twice with exit 1, then writes three records and succeeds
    let body = format!(
        r#"count=$(cat "{counter}" 2>/dev/null || echo 0)
count=$((count + 1))
echo "$count" > "{counter}"
if [ "$count" -lt 3 ]; then
  echo "connection reset by upstream" >&2
  exit 1
fi
cp "{records}" "$out"
exit 0"#,
        counter = counter.display(),
        records = records_file.display()
    );
    let script = write_script(&dir, "flaky-runner", &body);

    let supervisor = Supervisor::new(fast_retry());
    let started = Instant::now();
    let run = supervisor.run_detailed(&spec(script, 5_000)).await;

    assert!(run.result.error.is_none(), "{:?}", run.result.error);
    assert_eq!(run.result.items_found, 3);
    assert_eq!(run.result.records[0].parcel_id, "P-1");

    let outcomes: Vec<ExitOutcome> = run.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![ExitOutcome::Transient, ExitOutcome::Transient, ExitOutcome::Success]
    );

    // Backoff doubles between the failed attempts
    assert_eq!(run.attempts[0].delay, Duration::from_millis(10));
    assert_eq!(run.attempts[1].delay, Duration::from_millis(20));
    assert_eq!(run.attempts[2].delay, Duration::ZERO);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn permanent_failure_stops_after_one_attempt() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("attempts");
    let body = format!(
        r#"count=$(cat "{counter}" 2>/dev/null || echo 0)
echo $((count + 1)) > "{counter}"
echo "Invalid county: Foo" >&2
exit 2"#,
        counter = counter.display()
    );
    let script = write_script(&dir, "permanent-runner", &body);

    let supervisor = Supervisor::new(fast_retry());
    let run = supervisor.run_detailed(&spec(script, 5_000)).await;

    let error = run.result.error.expect("permanent failure must be an error");
    assert!(error.contains("AL scraper failed after 1 attempts"), "{error}");
    assert!(error.contains("Invalid county: Foo"), "{error}");

    assert_eq!(run.attempts.len(), 1);
    assert_eq!(run.attempts[0].outcome, ExitOutcome::Permanent);
    assert_eq!(std::fs::read_to_string(&counter).unwrap().trim(), "1");
}

#[tokio::test]
async fn rate_limited_exit_takes_fixed_cooldown() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "limited-runner", "echo 'HTTP 429' >&2\nexit 3");

    let supervisor = Supervisor::new(RetryConfig {
        max_attempts: 2,
        ..fast_retry()
    });
    let run = supervisor.run_detailed(&spec(script, 5_000)).await;

    assert!(run.result.is_failure());
    assert_eq!(run.attempts.len(), 2);
    assert_eq!(run.attempts[0].outcome, ExitOutcome::RateLimited);
    // Cooldown is the fixed rate-limit delay, not the exponential backoff
    assert_eq!(run.attempts[0].delay, Duration::from_millis(50));
}

#[tokio::test]
async fn timeout_escalates_to_kill() {
    let dir = TempDir::new().unwrap();
    // Ignores SIGTERM so the supervisor has to escalate to SIGKILL
    let script = write_script(&dir, "hung-runner", "trap '' TERM\nsleep 30");

    let supervisor = Supervisor::new(RetryConfig {
        max_attempts: 1,
        ..fast_retry()
    });
    let started = Instant::now();
    let run = supervisor.run_detailed(&spec(script, 300)).await;

    let error = run.result.error.expect("timeout must be an error");
    assert!(error.contains("timed out"), "{error}");
    assert_eq!(run.attempts[0].outcome, ExitOutcome::Transient);
    // The 30s sleep never runs to completion
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn graceful_term_is_honored_within_grace_period() {
    let dir = TempDir::new().unwrap();
    // Exits promptly on SIGTERM
    let script = write_script(&dir, "polite-runner", "trap 'exit 1' TERM\nsleep 30 &\nwait");

    let supervisor = Supervisor::new(RetryConfig {
        max_attempts: 1,
        ..fast_retry()
    });
    let started = Instant::now();
    let run = supervisor.run_detailed(&spec(script, 300)).await;

    assert!(run.result.is_failure());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn clean_exit_without_result_file_is_retried() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("attempts");
    let body = format!(
        r#"count=$(cat "{counter}" 2>/dev/null || echo 0)
echo $((count + 1)) > "{counter}"
exit 0"#,
        counter = counter.display()
    );
    let script = write_script(&dir, "forgetful-runner", &body);

    let supervisor = Supervisor::new(fast_retry());
    let run = supervisor.run_detailed(&spec(script, 5_000)).await;

    let error = run.result.error.expect("missing result file must fail");
    assert!(error.contains("failed after 3 attempts"), "{error}");
    assert!(error.contains("result file"), "{error}");
    assert_eq!(std::fs::read_to_string(&counter).unwrap().trim(), "3");
}

#[tokio::test]
async fn missing_binary_is_a_transient_failure() {
    let supervisor = Supervisor::new(RetryConfig {
        max_attempts: 1,
        ..fast_retry()
    });
    let run = supervisor
        .run_detailed(&spec(PathBuf::from("/nonexistent/runner"), 1_000))
        .await;

    let error = run.result.error.expect("spawn failure must be an error");
    assert!(error.contains("failed to launch"), "{error}");
    assert_eq!(run.attempts[0].outcome, ExitOutcome::Transient);
}
