//! Florida county tax deed auctions on the RealTaxDeed platform.
//!
//! Every supported county sits on the same RealTaxDeed/RealAuction software:
//! a calendar page links to per-date auction pages, each listing properties
//! in `.AUCTION_ITEM` blocks. Fields inside a block are free text, so
//! extraction is pattern-based.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::counties::{normalize_florida_county, CountySite};
use crate::models::PropertyRecord;
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::{extract_acreage, parse_amount, snapshot_harvest_failure};
use crate::snapshot::{DebugSnapshot, SnapshotRecorder};
use crate::utils::error::AppError;

const PAGE_DELAY: Duration = Duration::from_millis(2000);

/// Harvest tax deed auctions for one Florida county.
pub fn scrape_county(
    config: &ScraperConfig,
    recorder: &SnapshotRecorder,
    county_input: &str,
    max_pages: u32,
) -> Result<Vec<PropertyRecord>, AppError> {
    let site = normalize_florida_county(county_input)?;

    info!(
        "Starting Florida tax deed scrape for {} County at {}",
        site.name, site.listing_url
    );

    let mut last_content = String::new();
    let records = match harvest(config, site, max_pages, &mut last_content) {
        Ok(records) => records,
        Err(e) => {
            snapshot_harvest_failure(recorder, "FL", site.name, last_content, &e);
            return Err(e);
        }
    };

    if records.is_empty() {
        warn!("No properties found for {} County, saving debug snapshot", site.name);
        recorder.save(&DebugSnapshot::new(
            "FL",
            site.name,
            last_content,
            "no_properties_found",
        ));
    }

    info!("Scraped {} properties from {} County", records.len(), site.name);
    Ok(records)
}

/// Walk the auction calendar, keeping `last_content` current so the caller
/// can snapshot the page a failure happened on.
fn harvest(
    config: &ScraperConfig,
    site: &CountySite,
    max_pages: u32,
    last_content: &mut String,
) -> Result<Vec<PropertyRecord>, AppError> {
    let session = BrowserSession::new(config)?;
    session.navigate(site.listing_url)?;
    session.sleep(PAGE_DELAY);

    let calendar_html = session.content()?;
    *last_content = calendar_html.clone();

    let mut records: Vec<PropertyRecord> = Vec::new();
    let mut seen_parcels: HashSet<String> = HashSet::new();

    let day_links = extract_calendar_links(&calendar_html, site.listing_url, max_pages as usize);

    if day_links.is_empty() {
        // No calendar days; some counties list auctions on the landing page
        debug!("No calendar links found, checking for auction items on current page");
        collect_items(&calendar_html, site.name, &mut records, &mut seen_parcels);
    } else {
        info!("Found {} auction day links", day_links.len());
        for link in day_links {
            if let Err(e) = session.navigate(&link) {
                warn!("Skipping auction day {link}: {e}");
                continue;
            }
            session.sleep(PAGE_DELAY);
            let html = session.content()?;
            *last_content = html.clone();
            collect_items(&html, site.name, &mut records, &mut seen_parcels);
        }
    }

    Ok(records)
}

fn collect_items(
    html: &str,
    county_name: &str,
    records: &mut Vec<PropertyRecord>,
    seen_parcels: &mut HashSet<String>,
) {
    for record in parse_auction_items(html, county_name) {
        if seen_parcels.insert(record.parcel_id.clone()) {
            records.push(record);
        }
    }
}

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Calendar day links, absolute, capped at `limit`.
///
/// RealTaxDeed marks auction days with CALDAY-family classes; the anchors
/// point at per-date preview pages.
pub fn extract_calendar_links(html: &str, base_url: &str, limit: usize) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let element = anchor.value();
        let Some(href) = element.attr("href") else {
            continue;
        };

        let own_class = element.attr("class").unwrap_or_default().to_lowercase();
        let parent_class = anchor
            .parent()
            .and_then(|p| p.value().as_element())
            .and_then(|e| e.attr("class"))
            .unwrap_or_default()
            .to_lowercase();

        let is_calendar_day = own_class.contains("calday")
            || own_class.contains("calendar")
            || parent_class.contains("calday")
            || parent_class.contains("calendar");
        if !is_calendar_day {
            continue;
        }

        let Ok(absolute) = base.join(href) else {
            continue;
        };
        let absolute = absolute.to_string();
        if seen.insert(absolute.clone()) {
            links.push(absolute);
            if links.len() >= limit {
                break;
            }
        }
    }

    links
}

static ITEM_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".AUCTION_ITEM", ".AuctionItem", "[class*=\"auction\"]", ".auction-details"]
        .iter()
        .copied()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static TABLE_ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").unwrap());

/// All auction items on one page. Tries the RealTaxDeed item classes first,
/// then falls back to table rows.
pub fn parse_auction_items(html: &str, county_name: &str) -> Vec<PropertyRecord> {
    let document = Html::parse_document(html);

    for selector in ITEM_SELECTORS.iter() {
        let items: Vec<String> = document
            .select(selector)
            .map(|e| normalize_text(&e.text().collect::<Vec<_>>().join(" ")))
            .collect();
        if !items.is_empty() {
            return items
                .iter()
                .filter_map(|text| parse_auction_item(text, county_name))
                .collect();
        }
    }

    // Table-row fallback only trusts rows carrying auction vocabulary;
    // the hash-based ID fallback would otherwise invent records out of
    // navigation chrome.
    document
        .select(&TABLE_ROW_SELECTOR)
        .map(|e| normalize_text(&e.text().collect::<Vec<_>>().join(" ")))
        .filter(|text| {
            PARCEL_RE.is_match(text) || CERT_RE.is_match(text) || BID_RE.is_match(text)
        })
        .filter_map(|text| parse_auction_item(&text, county_name))
        .collect()
}

static PARCEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:parcel|property|tax)\s*(?:#|id|no\.?)?:?\s*([A-Z0-9][A-Z0-9\-]+)").unwrap()
});
static CERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cert(?:ificate)?\s*(?:#|no\.?)?:?\s*(\d+[-/]?\d*)").unwrap()
});
static BID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:opening|min(?:imum)?|starting)\s*bid:?\s*\$?([\d,]+(?:\.\d{2})?)").unwrap()
});
static DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([\d,]+(?:\.\d{2})?)").unwrap());
static OWNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:owner|defendant):?\s*([A-Za-z][A-Za-z\s,\.]+?)(?:\d|$|parcel|cert)").unwrap()
});
static AUCTION_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:sale|auction)\s*date:?\s*([\d/\-]+)").unwrap()
});

/// One free-text auction block into a record.
pub fn parse_auction_item(text: &str, county_name: &str) -> Option<PropertyRecord> {
    if text.trim().len() < 10 {
        return None;
    }

    let certificate = CERT_RE.captures(text).map(|c| c[1].to_string());

    let parcel_id = PARCEL_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .or_else(|| {
            certificate
                .as_ref()
                .map(|cert| format!("FL-{}-CERT-{cert}", county_name.to_uppercase()))
        })
        .unwrap_or_else(|| {
            format!("FL-{}-{:06}", county_name.to_uppercase(), stable_hash(text))
        });

    let amount = BID_RE
        .captures(text)
        .or_else(|| DOLLAR_RE.captures(text))
        .map_or(0.0, |c| parse_amount(&c[1]));

    let owner = OWNER_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| s.len() > 2);

    let auction_date = AUCTION_DATE_RE
        .captures(text)
        .and_then(|c| parse_auction_date(&c[1]));

    let description: String = text.chars().take(500).collect();

    Some(PropertyRecord {
        parcel_id,
        county: county_name.to_string(),
        state: "FL".to_string(),
        owner_name: owner,
        amount,
        acreage: extract_acreage(text),
        description,
        sale_type: "tax_deed".to_string(),
        year_sold: Some(
            auction_date
                .unwrap_or_else(Utc::now)
                .format("%Y")
                .to_string(),
        ),
        auction_date,
        data_source: "florida_realtaxdeed".to_string(),
        auction_platform: "RealTaxDeed".to_string(),
        scraped_at: Utc::now(),
    })
}

fn parse_auction_date(raw: &str) -> Option<DateTime<Utc>> {
    for format in ["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn stable_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish() % 1_000_000
}
