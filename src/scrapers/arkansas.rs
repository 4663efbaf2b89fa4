//! Arkansas Commissioner of State Lands (COSL) channel.
//!
//! The COSL auction platform serves its listings through a Kendo UI grid:
//! paginated POST requests against `/auctions/grid_read` returning
//! `{ "Data": [...], "Total": n }`. This is the one in-process channel:
//! plain HTTP, no browser, with its own per-page retry loop independent of
//! the subprocess supervisor.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{GridConfig, ScraperConfig};
use crate::models::{PropertyRecord, ScrapeResult};
use crate::scrapers::{backoff_delay, ScrapeChannel};
use crate::utils::error::AppError;

const GRID_ENDPOINT: &str = "/auctions/grid_read";
const ONGOING_ENDPOINT: &str = "/auctions/ongoing-auctions_grid_read";

/// One page of Kendo grid data.
#[derive(Debug, Default, Deserialize)]
struct GridPage {
    #[serde(rename = "Data", default)]
    data: Vec<Value>,
    #[serde(rename = "Total", default)]
    total: u64,
}

/// How a single request ended, before retry policy is applied.
enum FetchOutcome {
    Page(GridPage),
    /// 4xx or an unparsable body: a data problem, not a network problem.
    /// The page degrades to empty without consuming a retry.
    EmptyNoRetry(String),
    /// HTTP 429 with the delay the server asked for (or our cooldown).
    RateLimited(Duration),
}

pub struct ArkansasClient {
    http: Client,
    grid: GridConfig,
}

impl ArkansasClient {
    pub fn new(scraper: &ScraperConfig, grid: GridConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(scraper.request_timeout))
            .user_agent(&scraper.user_agent)
            .build()?;
        Ok(Self { http, grid })
    }

    /// Harvest the full COSL inventory: post-auction grid first, then the
    /// ongoing-auctions grid merged in best-effort.
    pub async fn scrape_all_properties(&self, county_filter: Option<&str>) -> ScrapeResult {
        let mut records: Vec<PropertyRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut partial_error: Option<String> = None;

        info!("Fetching COSL post-auction properties...");
        let mut page = 1u32;
        let mut total_fetched = 0u64;

        while page <= self.grid.max_pages {
            let grid = match self
                .fetch_grid_page(GRID_ENDPOINT, page, county_filter, self.grid.max_retries)
                .await
            {
                Ok(grid) => grid,
                Err(msg) => {
                    partial_error = Some(format!("page {page} failed: {msg}"));
                    break;
                }
            };

            if grid.data.is_empty() {
                break;
            }

            total_fetched += grid.data.len() as u64;
            for raw in &grid.data {
                match parse_listing(raw) {
                    Some(record) => {
                        if seen.insert(record.parcel_id.clone()) {
                            records.push(record);
                        }
                    }
                    None => warn!("Failed to parse property on page {page}"),
                }
            }

            info!(
                "Page {page}: fetched {} properties ({total_fetched}/{} total)",
                grid.data.len(),
                grid.total
            );

            if total_fetched >= grid.total {
                break;
            }

            page += 1;
            tokio::time::sleep(Duration::from_millis(self.grid.page_delay_ms)).await;
        }

        // Ongoing auctions: best-effort secondary fetch with a single attempt
        info!("Fetching COSL ongoing auction properties...");
        match self
            .fetch_grid_page(ONGOING_ENDPOINT, 1, county_filter, 1)
            .await
        {
            Ok(ongoing) => {
                for raw in &ongoing.data {
                    match parse_listing(raw) {
                        Some(record) => {
                            if seen.insert(record.parcel_id.clone()) {
                                records.push(record);
                            }
                        }
                        None => warn!("Failed to parse ongoing property"),
                    }
                }
            }
            Err(msg) => warn!("Ongoing auctions fetch skipped: {msg}"),
        }

        info!("Total properties scraped: {}", records.len());

        match partial_error {
            None => ScrapeResult::ok(records),
            Some(error) => ScrapeResult::partial(records, error),
        }
    }

    /// Fetch one grid page with exponential backoff on transient failures.
    ///
    /// Connectivity errors and HTTP 5xx retry with `min(base * 2^n, cap)`.
    /// HTTP 429 sleeps the server-supplied Retry-After (or the configured
    /// cooldown), uncapped by the exponential formula. 4xx and decode errors
    /// return an empty page immediately. Returns Err only when the retry
    /// budget is exhausted.
    async fn fetch_grid_page(
        &self,
        endpoint: &str,
        page: u32,
        county_filter: Option<&str>,
        max_retries: u32,
    ) -> Result<GridPage, String> {
        let mut last_error = String::new();

        for attempt in 0..max_retries {
            match self.fetch_once(endpoint, page, county_filter).await {
                Ok(FetchOutcome::Page(grid)) => return Ok(grid),
                Ok(FetchOutcome::EmptyNoRetry(reason)) => {
                    warn!("COSL page {page} degraded to empty: {reason}");
                    return Ok(GridPage::default());
                }
                Ok(FetchOutcome::RateLimited(delay)) => {
                    last_error = "rate limited (HTTP 429)".to_string();
                    if attempt + 1 < max_retries {
                        warn!(
                            "COSL rate limited on page {page}, cooling down {:.1}s",
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(msg) => {
                    last_error = msg;
                    if attempt + 1 < max_retries {
                        let delay = backoff_delay(
                            attempt,
                            Duration::from_millis(self.grid.base_delay_ms),
                            Duration::from_millis(self.grid.max_delay_ms),
                        );
                        warn!(
                            "Retry {}/{} after {:.1}s: {last_error}",
                            attempt + 1,
                            max_retries,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(format!("failed after {max_retries} attempts: {last_error}"))
    }

    async fn fetch_once(
        &self,
        endpoint: &str,
        page: u32,
        county_filter: Option<&str>,
    ) -> Result<FetchOutcome, String> {
        let url = format!("{}{}", self.grid.base_url, endpoint);
        let payload = build_grid_payload(page, self.grid.page_size, county_filter);

        let response = self
            .http
            .post(&url)
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", format!("{}/Auctions/ListingsView", self.grid.base_url))
            .form(&payload)
            .send()
            .await
            .map_err(|e| format!("request error: {e}"))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let delay = retry_after_delay(
                response.headers().get(RETRY_AFTER),
                Duration::from_millis(self.grid.rate_limit_delay_ms),
            );
            return Ok(FetchOutcome::RateLimited(delay));
        }

        if status.is_server_error() {
            return Err(format!("server error: HTTP {status}"));
        }

        if status.is_client_error() {
            return Ok(FetchOutcome::EmptyNoRetry(format!("client error: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("body read error: {e}"))?;

        match serde_json::from_str::<GridPage>(&body) {
            Ok(grid) => Ok(FetchOutcome::Page(grid)),
            Err(e) => Ok(FetchOutcome::EmptyNoRetry(format!("JSON decode error: {e}"))),
        }
    }
}

#[async_trait]
impl ScrapeChannel for ArkansasClient {
    fn channel_name(&self) -> &'static str {
        "Arkansas"
    }

    async fn scrape(&self, county: Option<&str>) -> ScrapeResult {
        self.scrape_all_properties(county).await
    }
}

/// Parse a numeric Retry-After header, falling back to the fixed cooldown.
pub(crate) fn retry_after_delay(header: Option<&HeaderValue>, fallback: Duration) -> Duration {
    header
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

/// Kendo UI grid request payload for one page, with an optional county
/// `contains` filter.
fn build_grid_payload(page: u32, page_size: usize, county_filter: Option<&str>) -> Vec<(String, String)> {
    let skip = (page as usize - 1) * page_size;
    let mut payload = vec![
        ("take".to_string(), page_size.to_string()),
        ("skip".to_string(), skip.to_string()),
        ("page".to_string(), page.to_string()),
        ("pageSize".to_string(), page_size.to_string()),
        ("sort".to_string(), String::new()),
    ];

    if let Some(county) = county_filter {
        payload.push(("filter[filters][0][field]".to_string(), "County".to_string()));
        payload.push(("filter[filters][0][operator]".to_string(), "contains".to_string()));
        payload.push(("filter[filters][0][value]".to_string(), county.to_string()));
        payload.push(("filter[logic]".to_string(), "and".to_string()));
    }

    payload
}

/// Map one raw grid row onto the normalized record shape.
///
/// Field names discovered from the live API: `ListingToken`,
/// `CoSLParcelNumber`, `CoSLCountyName`, `Owner`, `Acreage`,
/// `Section`/`Township`/`Range`, `StartingBid`, `CurrentBid`, `Added`.
fn parse_listing(raw: &Value) -> Option<PropertyRecord> {
    let parcel_id = str_field(raw, &["CoSLParcelNumber", "ParcelNumber"])?;
    if parcel_id.is_empty() {
        return None;
    }

    let county = str_field(raw, &["CoSLCountyName", "County"]).unwrap_or_default();
    let owner = str_field(raw, &["Owner"]).filter(|s| !s.is_empty());
    let acreage = num_field(raw, &["Acreage", "Acres"]).filter(|a| *a > 0.0);

    let starting_bid = num_field(raw, &["StartingBid"]).unwrap_or(0.0);
    let current_bid = num_field(raw, &["CurrentBid"]).unwrap_or(0.0);
    let amount = if current_bid > 0.0 { current_bid } else { starting_bid };

    let description = build_legal_description(raw, &parcel_id, acreage);

    let added_on = str_field(raw, &["Added", "AddedOn"]).and_then(|s| parse_added_date(&s));

    Some(PropertyRecord {
        parcel_id,
        county,
        state: "AR".to_string(),
        owner_name: owner,
        amount,
        acreage,
        description,
        sale_type: "tax_deed".to_string(),
        year_sold: Some(Utc::now().format("%Y").to_string()),
        auction_date: added_on,
        data_source: "arkansas_cosl".to_string(),
        auction_platform: "COSL Website".to_string(),
        scraped_at: Utc::now(),
    })
}

/// Legal description from section/township/range parts.
fn build_legal_description(raw: &Value, parcel_id: &str, acreage: Option<f64>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(section) = str_field(raw, &["Section"]).filter(|s| !s.is_empty()) {
        parts.push(format!("SEC {section}"));
    }
    if let Some(township) = str_field(raw, &["Township"]).filter(|s| !s.is_empty()) {
        parts.push(format!("TWP {township}"));
    }
    if let Some(range) = str_field(raw, &["Range"]).filter(|s| !s.is_empty()) {
        parts.push(format!("RNG {range}"));
    }
    if let Some(acres) = acreage {
        parts.push(format!("{acres:.2} ACRES"));
    }

    if parts.is_empty() {
        format!("Parcel {parcel_id}")
    } else {
        parts.join(" ")
    }
}

/// The grid emits dates in two shapes: .NET JSON (`/Date(1234567890000)/`)
/// and ISO-8601 with fractional seconds.
fn parse_added_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Some(inner) = raw.strip_prefix("/Date(").and_then(|s| s.strip_suffix(")/")) {
        let millis: i64 = inner.parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }

    // ISO format, fractional seconds trimmed: 2025-12-20T06:05:26.6002548
    let trimmed = raw.split('.').next().unwrap_or(raw);
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn str_field(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match raw.get(key) {
            Some(Value::String(s)) => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => continue,
        }
    }
    None
}

fn num_field(raw: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match raw.get(key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(parsed) = s.trim().parse::<f64>() {
                    return Some(parsed);
                }
            }
            _ => continue,
        }
    }
    None
}
