use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::ExitOutcome;

/// Channel-agnostic property listing.
///
/// Every scrape channel emits this exact shape; the runner binaries write a
/// JSON array of these to the supervisor's result file. Downstream
/// persistence upserts keyed on (state, parcel_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyRecord {
    pub parcel_id: String,
    pub county: String,
    pub state: String,
    pub owner_name: Option<String>,
    pub amount: f64,
    pub acreage: Option<f64>,
    pub description: String,

    // Sale mechanics (fixed per jurisdiction)
    pub sale_type: String,
    pub year_sold: Option<String>,
    pub auction_date: Option<DateTime<Utc>>,

    // Provenance
    pub data_source: String,
    pub auction_platform: String,
    pub scraped_at: DateTime<Utc>,
}

/// Standardized result from any scrape channel.
///
/// A non-empty `error` is the primary failure signal. A result may carry
/// both partial records and a trailing error when a harvest degraded midway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub records: Vec<PropertyRecord>,
    pub items_found: usize,
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn ok(records: Vec<PropertyRecord>) -> Self {
        let items_found = records.len();
        Self {
            records,
            items_found,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            items_found: 0,
            error: Some(error.into()),
        }
    }

    pub fn partial(records: Vec<PropertyRecord>, error: impl Into<String>) -> Self {
        let items_found = records.len();
        Self {
            records,
            items_found,
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// One supervised execution attempt: which attempt it was, the delay applied
/// before the next one, and how the attempt was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub delay: Duration,
    pub outcome: ExitOutcome,
}

/// Drop duplicate parcels within a single harvest pass, keeping the first
/// occurrence so site-presentation order is preserved. Cross-pass dedup is
/// the persistence layer's job.
pub fn dedup_records(records: Vec<PropertyRecord>) -> Vec<PropertyRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.parcel_id.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) fn test_record(parcel_id: &str) -> PropertyRecord {
    PropertyRecord {
        parcel_id: parcel_id.to_string(),
        county: "Pulaski".to_string(),
        state: "AR".to_string(),
        owner_name: Some("DOE JOHN".to_string()),
        amount: 1250.0,
        acreage: Some(2.5),
        description: "SEC 14 TWP 2N RNG 12W 2.50 ACRES".to_string(),
        sale_type: "tax_deed".to_string(),
        year_sold: Some("2026".to_string()),
        auction_date: None,
        data_source: "arkansas_cosl".to_string(),
        auction_platform: "COSL Website".to_string(),
        scraped_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_result_counts_records() {
        let result = ScrapeResult::ok(vec![test_record("a"), test_record("b")]);
        assert_eq!(result.items_found, 2);
        assert!(result.error.is_none());
        assert!(!result.is_failure());
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = ScrapeResult::failed("Alabama scraper failed: boom");
        assert_eq!(result.items_found, 0);
        assert!(result.records.is_empty());
        assert!(result.is_failure());
    }

    #[test]
    fn test_partial_result_keeps_both() {
        let result = ScrapeResult::partial(vec![test_record("a")], "page 3 failed");
        assert_eq!(result.items_found, 1);
        assert_eq!(result.error.as_deref(), Some("page 3 failed"));
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let records = vec![
            test_record("a"),
            test_record("b"),
            test_record("a"),
            test_record("c"),
            test_record("b"),
        ];
        let deduped = dedup_records(records);
        let ids: Vec<&str> = deduped.iter().map(|r| r.parcel_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_record_serialization_round_trip() {
        let record = test_record("001-12345-000");
        let json = serde_json::to_string(&record).unwrap();
        let back: PropertyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_runner_file_shape_is_a_json_array() {
        let records = vec![test_record("a"), test_record("b")];
        let json = serde_json::to_string(&records).unwrap();
        assert!(json.starts_with('['));
        let back: Vec<PropertyRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
    }
}
