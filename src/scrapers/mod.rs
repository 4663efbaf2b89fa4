//! Harvest channels and the orchestration layer above them.
//!
//! Two channel shapes exist: the in-process HTTP grid client (Arkansas) and
//! out-of-process browser runner binaries (Alabama, Texas, Florida) launched
//! through the retry supervisor.

pub mod alabama;
pub mod arkansas;
pub mod browser;
pub mod factory;
pub mod florida;
pub mod supervisor;
pub mod texas;

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::models::ScrapeResult;
use crate::snapshot::{DebugSnapshot, SnapshotRecorder};
use crate::utils::error::AppError;

/// Exponential backoff shared by both retry loops: `min(base * 2^attempt, cap)`.
pub(crate) fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(cap)
}

/// Currency string to float: "$12,345.67" -> 12345.67, garbage -> 0.0.
pub(crate) fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

static ACREAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:ACRES?|AC\b)").unwrap());

/// Pull an acreage figure out of a legal description, when one is stated.
pub(crate) fn extract_acreage(description: &str) -> Option<f64> {
    let captures = ACREAGE_RE.captures(description)?;
    let acres: f64 = captures.get(1)?.as_str().parse().ok()?;
    (acres > 0.0 && acres < 100_000.0).then_some(acres)
}

/// Persist the last page content when a harvest dies mid-flight, tagged with
/// the error text, before the error goes on to exit classification. The
/// recorder swallows its own failures, so this can never mask the harvest
/// error.
pub(crate) fn snapshot_harvest_failure(
    recorder: &SnapshotRecorder,
    state: &str,
    county: &str,
    content: String,
    err: &AppError,
) {
    warn!("Harvest for {county} failed, saving debug snapshot: {err}");
    recorder.save(&DebugSnapshot::new(state, county, content, err.to_string()));
}

/// A harvest strategy for one jurisdiction.
///
/// Channels never panic across this boundary; every failure mode folds into
/// the returned [`ScrapeResult`].
#[async_trait]
pub trait ScrapeChannel: Send + Sync {
    fn channel_name(&self) -> &'static str;

    /// Run a full harvest, optionally narrowed to one county.
    async fn scrape(&self, county: Option<&str>) -> ScrapeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles_then_caps() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);
        assert_eq!(backoff_delay(0, base, cap), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, base, cap), Duration::from_secs(2));
        assert_eq!(backoff_delay(4, base, cap), Duration::from_secs(16));
        assert_eq!(backoff_delay(10, base, cap), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56"), 1234.56);
        assert_eq!(parse_amount("890"), 890.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("n/a"), 0.0);
    }

    #[test]
    fn test_extract_acreage() {
        assert_eq!(extract_acreage("LOT 4, 1.25 ACRES"), Some(1.25));
        assert_eq!(extract_acreage("40 AC MORE OR LESS"), Some(40.0));
        assert_eq!(extract_acreage("3 acres wooded"), Some(3.0));
        assert_eq!(extract_acreage("LOT 4 BLK 2"), None);
        assert_eq!(extract_acreage("0 ACRES"), None);
    }

    #[test]
    fn test_harvest_failure_writes_snapshot_with_error_reason() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = SnapshotRecorder::new(tmp.path());
        let err = AppError::Browser("Page load failed: tab crashed".to_string());

        snapshot_harvest_failure(
            &recorder,
            "AL",
            "Baldwin",
            "<html>mid-harvest page</html>".to_string(),
            &err,
        );

        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("AL_Baldwin_"), "{name}");
        assert_eq!(
            std::fs::read_to_string(&entries[0]).unwrap(),
            "<html>mid-harvest page</html>"
        );
    }
}
