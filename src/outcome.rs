use serde::{Deserialize, Serialize};

/// Outcome classes shared by every scrape channel.
///
/// These drive retry policy, not severity: `Transient` retries with
/// exponential backoff, `Permanent` stops immediately, `RateLimited` retries
/// after an extended cooldown regardless of the attempt index. Runner
/// binaries signal these as process exit codes 0..=3.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Transient,
    Permanent,
    RateLimited,
}

impl ExitOutcome {
    /// Process exit code for this outcome.
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Transient => 1,
            ExitOutcome::Permanent => 2,
            ExitOutcome::RateLimited => 3,
        }
    }

    /// Map a child process exit code back to an outcome.
    ///
    /// Unknown codes (and a missing code, e.g. killed by signal) are treated
    /// as `Transient` so the supervisor fails open toward retry.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ExitOutcome::Success,
            Some(2) => ExitOutcome::Permanent,
            Some(3) => ExitOutcome::RateLimited,
            _ => ExitOutcome::Transient,
        }
    }
}

/// Vocabulary that marks an error as rate limiting / access denial.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "429",
    "too many requests",
    "access denied",
    "403",
];

/// Vocabulary that marks an error as a transient infrastructure failure.
const TRANSIENT_MARKERS: &[&str] = &["timeout", "timed out", "connection", "network"];

/// Classify free-form error text into a non-success outcome.
///
/// Substring matching on prose is heuristic; it is centralized here so a
/// structured error envelope from the runners could replace it at one seam.
pub fn classify_error_text(text: &str) -> ExitOutcome {
    let lowered = text.to_lowercase();

    if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ExitOutcome::RateLimited;
    }
    if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ExitOutcome::Transient;
    }

    // Unclassified errors fail open toward retry
    ExitOutcome::Transient
}
