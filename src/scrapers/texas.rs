//! Texas county tax sale sites.
//!
//! Texas has no centralized system; each county picks its own platform, so
//! the runner dispatches on the site format recorded in the county table.
//! Harris publishes key/value listing cards, El Paso a plain notice table,
//! and the rest fall back to a generic table heuristic.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::counties::{normalize_texas_county, CountySite, SiteFormat};
use crate::models::PropertyRecord;
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::{extract_acreage, parse_amount, snapshot_harvest_failure};
use crate::snapshot::{DebugSnapshot, SnapshotRecorder};
use crate::utils::error::AppError;

const SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Harvest tax sale properties for one Texas county.
pub fn scrape_county(
    config: &ScraperConfig,
    recorder: &SnapshotRecorder,
    county_input: &str,
    _max_pages: u32,
) -> Result<Vec<PropertyRecord>, AppError> {
    let site = normalize_texas_county(county_input)?;

    info!(
        "Starting Texas tax sale scrape for {} County at {}",
        site.name, site.listing_url
    );

    if site.format == SiteFormat::GovEase {
        warn!(
            "{} County uses the GovEase platform which requires registration; \
             visit govease.com to view listings",
            site.name
        );
        return Ok(Vec::new());
    }

    let mut last_content = String::new();
    let records = match harvest(config, site, &mut last_content) {
        Ok(records) => records,
        Err(e) => {
            snapshot_harvest_failure(recorder, "TX", site.name, last_content, &e);
            return Err(e);
        }
    };

    if records.is_empty() {
        warn!("No properties found for {} County, saving debug snapshot", site.name);
        recorder.save(&DebugSnapshot::new(
            "TX",
            site.name,
            last_content,
            "no_properties_found",
        ));
    }

    info!("Scraped {} properties from {} County", records.len(), site.name);
    Ok(records)
}

fn harvest(
    config: &ScraperConfig,
    site: &CountySite,
    last_content: &mut String,
) -> Result<Vec<PropertyRecord>, AppError> {
    let session = BrowserSession::new(config)?;
    session.navigate(site.listing_url)?;
    session.sleep(SETTLE_DELAY);
    let html = session.content()?;
    *last_content = html.clone();

    Ok(match site.format {
        SiteFormat::HarrisTax => parse_harris(&html, site.name),
        SiteFormat::ElPasoHtml => parse_el_paso(&html, site.name),
        SiteFormat::RealAuction => {
            warn!(
                "{} County uses the RealAuction platform, no dedicated parser yet; \
                 trying the generic table heuristic",
                site.name
            );
            parse_generic(&html, site.name)
        }
        SiteFormat::GovEase => unreachable!("handled by the caller"),
        SiteFormat::Generic => parse_generic(&html, site.name),
    })
}

static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());
static DATA_CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

fn cell_texts(row: scraper::ElementRef<'_>, selector: &Selector) -> Vec<String> {
    row.select(selector)
        .map(|c| {
            c.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn base_record(parcel_id: String, county: &str, amount: f64, description: String) -> PropertyRecord {
    PropertyRecord {
        acreage: extract_acreage(&description),
        parcel_id,
        county: county.to_string(),
        state: "TX".to_string(),
        owner_name: None,
        amount,
        description,
        sale_type: "redeemable_deed".to_string(),
        year_sold: Some(Utc::now().format("%Y").to_string()),
        auction_date: None,
        data_source: "texas_county_sites".to_string(),
        auction_platform: "County-specific".to_string(),
        scraped_at: Utc::now(),
    }
}

static MONEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d,]+(?:\.\d{2})?").unwrap());

/// Harris County tax office listings: each property is a run of key/value
/// table rows, with a one-cell "Adjudged Value: $X" row opening the block.
pub fn parse_harris(html: &str, county_name: &str) -> Vec<PropertyRecord> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();

    let mut flush = |data: &mut HashMap<String, String>, records: &mut Vec<PropertyRecord>| {
        if let Some(record) = harris_record(data, county_name) {
            records.push(record);
        }
        data.clear();
    };

    for table in document.select(&TABLE_SELECTOR) {
        for row in table.select(&ROW_SELECTOR) {
            let cells = cell_texts(row, &CELL_SELECTOR);

            if cells.len() >= 2 {
                let key = normalize_key(&cells[0]);
                let value = cells[1].trim().to_string();
                if !key.is_empty() && !value.is_empty() {
                    current.insert(key, value);
                }
            } else if cells.len() == 1 && cells[0].contains("Adjudged Value") {
                // Start of a new property block
                flush(&mut current, &mut records);
                if let Some(m) = MONEY_RE.find(&cells[0]) {
                    current.insert("adjudged_value".to_string(), m.as_str().to_string());
                }
            }
        }
    }
    flush(&mut current, &mut records);

    records
}

fn normalize_key(raw: &str) -> String {
    raw.replace(':', "").trim().to_lowercase().replace(' ', "_")
}

fn harris_record(data: &HashMap<String, String>, county: &str) -> Option<PropertyRecord> {
    let cause_number = data.get("cause#").or_else(|| data.get("sale#"))?;

    let amount = data.get("minimum_bid").map_or(0.0, |s| parse_amount(s));

    let mut desc_parts: Vec<String> = Vec::new();
    if let Some(property_type) = data.get("type") {
        desc_parts.push(format!("Type: {property_type}"));
    }
    if let Some(years) = data.get("tax_years_in_judgement") {
        desc_parts.push(format!("Tax Years: {years}"));
    }
    if let Some(precinct) = data.get("precinct") {
        desc_parts.push(precinct.clone());
    }
    if let Some(value) = data.get("adjudged_value") {
        desc_parts.push(format!("Adjudged Value: {value}"));
    }
    let description = if desc_parts.is_empty() {
        format!("Cause #{cause_number}")
    } else {
        desc_parts.join("; ")
    };

    Some(base_record(
        format!("TX-HARRIS-{cause_number}"),
        county,
        amount,
        description,
    ))
}

static SALE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)((?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2},?\s+\d{4})",
    )
    .unwrap()
});
static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:TAX\s*)?(?:ACCT|ACCOUNT)[\s\(\):\.#]*(?:NO[\s\.:#]*)?([A-Z]?\d{8,})")
        .unwrap()
});
static LOT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)LOT\s+(\d+)").unwrap());
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)BLOCK\s+(\d+)").unwrap());
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:STREET\s*ADDR[:\s]*)?(\d+\s+[A-Za-z0-9\s]+(?:RD|ST|AVE|DR|BLVD|LN|WAY|CT|PL|CIR)\.?)")
        .unwrap()
});

/// El Paso sheriff sale notices: a table of (Sale Date, Time, Location,
/// Property Description) rows where one description cell can hold several
/// properties split on "STREET ADDR" markers. No bid amounts on this site.
pub fn parse_el_paso(html: &str, county_name: &str) -> Vec<PropertyRecord> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();
    let mut seen_parcels = std::collections::HashSet::new();
    let mut current_sale_date: Option<DateTime<Utc>> = None;
    let mut current_location: Option<String> = None;

    for table in document.select(&TABLE_SELECTOR) {
        for row in table.select(&ROW_SELECTOR) {
            let cells = cell_texts(row, &DATA_CELL_SELECTOR);
            if cells.len() < 3 {
                continue;
            }

            let first_lower = cells[0].to_lowercase();
            if first_lower.is_empty() || first_lower.contains("sale date") || first_lower == "date"
            {
                continue;
            }

            if let Some(m) = SALE_DATE_RE.captures(&cells[0]) {
                current_sale_date = parse_sale_date(&m[1]);
                current_location = cells.get(2).cloned();
            }

            // Description is the last column with substantial content
            let Some(description) = cells.iter().rev().find(|t| t.len() > 20) else {
                continue;
            };

            for block in split_property_blocks(description) {
                let Some(parcel_id) = el_paso_parcel_id(&block) else {
                    continue;
                };
                if !seen_parcels.insert(parcel_id.clone()) {
                    continue;
                }

                let mut clean_desc: String = block.chars().take(400).collect();
                if let Some(location) = &current_location {
                    clean_desc = format!("{clean_desc}; Sale Location: {location}");
                }

                let mut record = base_record(parcel_id, county_name, 0.0, clean_desc);
                record.auction_date = current_sale_date;
                records.push(record);
            }
        }
    }

    info!("Parsed {} properties from El Paso County", records.len());
    records
}

fn parse_sale_date(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.replace(',', "");
    NaiveDate::parse_from_str(&normalized, "%B %d %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// One description cell may announce several properties; each starts at a
/// "STREET ADDR" marker.
fn split_property_blocks(description: &str) -> Vec<String> {
    static SPLIT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)STREET\s*ADDR").unwrap());

    let mut blocks = Vec::new();
    let mut starts: Vec<usize> = SPLIT_RE.find_iter(description).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(description.len());

    for window in starts.windows(2) {
        let block = description[window[0]..window[1]].trim();
        if block.len() >= 10 {
            blocks.push(block.to_string());
        }
    }
    blocks
}

fn el_paso_parcel_id(block: &str) -> Option<String> {
    if let Some(captures) = ACCOUNT_RE.captures(block) {
        return Some(format!("TX-ELPASO-{}", &captures[1]));
    }
    if let (Some(lot), Some(blk)) = (LOT_RE.captures(block), BLOCK_RE.captures(block)) {
        return Some(format!("TX-ELPASO-L{}-B{}", &lot[1], &blk[1]));
    }
    if let Some(address) = ADDRESS_RE.captures(block) {
        return Some(format!("TX-ELPASO-{:05}", stable_hash(address[1].trim())));
    }
    Some(format!("TX-ELPASO-{:05}", stable_hash(block)))
}

fn stable_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish() % 100_000
}

const PROPERTY_HEADER_MARKERS: &[&str] = &[
    "parcel", "property", "account", "cause", "address", "description", "amount", "bid",
];

static PARCEL_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:parcel|account|cause|case)\s*(?:#|no\.?|number|id)?\s*[:\s]\s*([A-Z0-9][A-Z0-9\-\.]{4,})")
        .unwrap()
});
static ID_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9\-\./]{4,}$").unwrap());

/// Generic fallback for counties without a dedicated parser: find tables
/// whose header row mentions property vocabulary and mine their data rows.
pub fn parse_generic(html: &str, county_name: &str) -> Vec<PropertyRecord> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();
    let mut seen_parcels = std::collections::HashSet::new();

    for table in document.select(&TABLE_SELECTOR) {
        let mut rows = table.select(&ROW_SELECTOR);
        let Some(header_row) = rows.next() else {
            continue;
        };

        let header_text = cell_texts(header_row, &CELL_SELECTOR).join(" ").to_lowercase();
        if !PROPERTY_HEADER_MARKERS.iter().any(|m| header_text.contains(m)) {
            continue;
        }

        for row in rows {
            let cells = cell_texts(row, &DATA_CELL_SELECTOR);
            if cells.iter().all(String::is_empty) {
                continue;
            }
            let text = cells.join("; ");

            let parcel_id = PARCEL_LABEL_RE
                .captures(&text)
                .map(|c| c[1].to_string())
                .or_else(|| {
                    cells
                        .first()
                        .filter(|c| ID_LIKE_RE.is_match(&c.to_uppercase()))
                        .cloned()
                });
            let Some(parcel_id) = parcel_id else {
                continue;
            };
            if !seen_parcels.insert(parcel_id.clone()) {
                continue;
            }

            let amount = MONEY_RE
                .find(&text)
                .map_or(0.0, |m| parse_amount(m.as_str()));
            let description: String = text.chars().take(400).collect();

            records.push(base_record(parcel_id, county_name, amount, description));
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARRIS_HTML: &str = r#"
        <html><body>
        <table>
            <tr><td>Adjudged Value: $45,000.00</td></tr>
            <tr><td>Cause#:</td><td>2023-12345</td></tr>
            <tr><td>Minimum Bid:</td><td>$12,500.00</td></tr>
            <tr><td>Type:</td><td>Vacant Lot</td></tr>
            <tr><td>Tax Years in Judgement:</td><td>2019-2022</td></tr>
        </table>
        <table>
            <tr><td>Adjudged Value: $80,000.00</td></tr>
            <tr><td>Cause#:</td><td>2023-67890</td></tr>
            <tr><td>Minimum Bid:</td><td>$30,000.00</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_harris_cards() {
        let records = parse_harris(HARRIS_HTML, "Harris");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.parcel_id, "TX-HARRIS-2023-12345");
        assert_eq!(first.amount, 12500.0);
        assert!(first.description.contains("Type: Vacant Lot"));
        assert!(first.description.contains("Tax Years: 2019-2022"));
        assert!(first.description.contains("Adjudged Value: $45,000.00"));
        assert_eq!(first.state, "TX");
        assert_eq!(first.sale_type, "redeemable_deed");

        assert_eq!(records[1].parcel_id, "TX-HARRIS-2023-67890");
        assert!(records[1].description.contains("Adjudged Value: $80,000.00"));
    }

    #[test]
    fn test_harris_block_without_cause_is_dropped() {
        let html = r#"
            <table>
                <tr><td>Adjudged Value: $10,000.00</td></tr>
                <tr><td>Minimum Bid:</td><td>$500.00</td></tr>
            </table>
        "#;
        assert!(parse_harris(html, "Harris").is_empty());
    }

    const EL_PASO_HTML: &str = r#"
        <html><body>
        <table>
            <tr><td>Sale Date</td><td>Time</td><td>Location</td><td>Description</td></tr>
            <tr>
                <td>January 7, 2026</td><td>10:00 AM</td><td>County Courthouse</td>
                <td>STREET ADDR: 123 MAIN ST TAX ACCT NO C30199902507700 LOT 5 BLOCK 12
                    STREET ADDR: 456 OAK AVE LOT 9 BLOCK 3 2.5 ACRES TRACT</td>
            </tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_el_paso_splits_blocks() {
        let records = parse_el_paso(EL_PASO_HTML, "El Paso");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.parcel_id, "TX-ELPASO-C30199902507700");
        assert_eq!(first.amount, 0.0);
        assert!(first.description.contains("Sale Location: County Courthouse"));
        assert_eq!(
            first.auction_date.unwrap().format("%Y-%m-%d").to_string(),
            "2026-01-07"
        );

        let second = &records[1];
        assert_eq!(second.parcel_id, "TX-ELPASO-L9-B3");
        assert_eq!(second.acreage, Some(2.5));
    }

    #[test]
    fn test_el_paso_dedups_repeated_accounts() {
        let html = r#"
            <table>
                <tr>
                    <td>March 3, 2026</td><td>10:00</td><td>Annex</td>
                    <td>NOTICE OF SALE TAX ACCT NO 123456789 SOME LONG DESCRIPTION HERE</td>
                </tr>
                <tr>
                    <td>March 3, 2026</td><td>10:00</td><td>Annex</td>
                    <td>NOTICE OF SALE TAX ACCT NO 123456789 SOME LONG DESCRIPTION HERE</td>
                </tr>
            </table>
        "#;
        assert_eq!(parse_el_paso(html, "El Paso").len(), 1);
    }

    #[test]
    fn test_parse_generic_table() {
        let html = r#"
            <table>
                <tr><th>Parcel Number</th><th>Description</th><th>Minimum Bid</th></tr>
                <tr><td>R-12345</td><td>LOT 1 SOMEWHERE</td><td>$4,200.00</td></tr>
                <tr><td>R-67890</td><td>TRACT B</td><td>$999.99</td></tr>
            </table>
        "#;
        let records = parse_generic(html, "Tarrant");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].parcel_id, "R-12345");
        assert_eq!(records[0].amount, 4200.0);
        assert_eq!(records[1].county, "Tarrant");
    }

    #[test]
    fn test_parse_generic_skips_unrelated_tables() {
        let html = r#"
            <table>
                <tr><th>Office Hours</th><th>Phone</th></tr>
                <tr><td>Mon-Fri</td><td>555-0100</td></tr>
            </table>
        "#;
        assert!(parse_generic(html, "Collin").is_empty());
    }

    #[test]
    fn test_parse_sale_date_variants() {
        assert!(parse_sale_date("January 7, 2026").is_some());
        assert!(parse_sale_date("January 7 2026").is_some());
        assert!(parse_sale_date("07/01/2026").is_none());
    }
}
