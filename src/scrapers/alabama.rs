//! Alabama Department of Revenue (ADOR) delinquent property search.
//!
//! County-based tax lien state. The search form is JavaScript-driven, so the
//! runner drives a headless browser: pick the county in the dropdown, submit,
//! then walk the paginated results table.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::counties::{normalize_alabama_county, ALABAMA_COUNTY_CODES};
use crate::models::PropertyRecord;
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::{extract_acreage, parse_amount, snapshot_harvest_failure};
use crate::snapshot::{DebugSnapshot, SnapshotRecorder};
use crate::utils::error::AppError;

pub const BASE_URL: &str = "https://www.revenue.alabama.gov/property-tax/delinquent-search/";

const COUNTY_SELECT: &str = r#"select[name="ador-delinquent-county"]"#;
// The ADOR page really does truncate the submit button id
const SUBMIT_BUTTON: &str = "button#ador-delinquent-county-submi";
const RESULTS_OR_EMPTY: &str = "table.table-striped, div.alert-warning, .no-results";
const PAGE_DELAY: Duration = Duration::from_millis(1500);

/// Harvest delinquent properties for one Alabama county.
pub fn scrape_county(
    config: &ScraperConfig,
    recorder: &SnapshotRecorder,
    county_input: &str,
    max_pages: u32,
) -> Result<Vec<PropertyRecord>, AppError> {
    let county_code = normalize_alabama_county(county_input)?;
    let county_name = ALABAMA_COUNTY_CODES
        .get(county_code)
        .copied()
        .unwrap_or("Unknown");

    info!("Starting Alabama ADOR scrape for {county_name} (code: {county_code})");

    let mut last_content = String::new();
    let records = match harvest(config, county_code, county_name, max_pages, &mut last_content) {
        Ok(records) => records,
        Err(e) => {
            snapshot_harvest_failure(recorder, "AL", county_name, last_content, &e);
            return Err(e);
        }
    };

    if records.is_empty() {
        warn!("No properties found for {county_name}, saving debug snapshot");
        recorder.save(&DebugSnapshot::new(
            "AL",
            county_name,
            last_content,
            "no_properties_found",
        ));
    }

    info!("Scraped {} properties from {county_name}", records.len());
    Ok(records)
}

/// Drive the form and walk the result pages, keeping `last_content` current
/// so the caller can snapshot the page a failure happened on.
fn harvest(
    config: &ScraperConfig,
    county_code: &str,
    county_name: &str,
    max_pages: u32,
    last_content: &mut String,
) -> Result<Vec<PropertyRecord>, AppError> {
    let session = BrowserSession::new(config)?;
    session.navigate(BASE_URL)?;
    session.set_select_value(COUNTY_SELECT, county_code)?;
    session.click(SUBMIT_BUTTON)?;

    if session.wait_for(RESULTS_OR_EMPTY).is_err() {
        warn!("Timeout waiting for results for {county_name}");
        return Ok(Vec::new());
    }

    let mut records: Vec<PropertyRecord> = Vec::new();

    for page in 1..=max_pages {
        let html = session.content()?;
        *last_content = html.clone();

        if !has_results_table(&html) {
            if html.contains("No matching records")
                || html.to_lowercase().contains("no records found")
            {
                info!("No delinquent properties found for {county_name}");
            }
            break;
        }

        let page_records = parse_results_table(&html, county_name);
        info!("Page {page}: parsed {} properties", page_records.len());
        records.extend(page_records);

        if !has_next_page(&html) {
            break;
        }

        click_next_link(&session)?;
        session.sleep(PAGE_DELAY);
        session.wait_for(RESULTS_OR_EMPTY)?;
    }

    Ok(records)
}

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.table-striped").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

fn has_results_table(html: &str) -> bool {
    Html::parse_document(html)
        .select(&TABLE_SELECTOR)
        .next()
        .is_some()
}

/// Whether an enabled "Next" pagination link is present.
fn has_next_page(html: &str) -> bool {
    let document = Html::parse_document(html);
    document.select(&LINK_SELECTOR).any(|a| {
        let text = a.text().collect::<String>();
        let class = a.value().attr("class").unwrap_or_default();
        let parent_class = a
            .parent()
            .and_then(|p| p.value().as_element())
            .and_then(|e| e.attr("class"))
            .unwrap_or_default();
        text.trim() == "Next" && !class.contains("disabled") && !parent_class.contains("disabled")
    })
}

/// Parse the ADOR results table.
///
/// Columns as served in 2026: 'CS Number', 'County Code', 'Document Number',
/// 'Parcel ID', 'Year Sold', 'Assessed Value', 'Amount Bid at Tax Sale',
/// 'Name', 'Description'.
pub fn parse_results_table(html: &str, county_name: &str) -> Vec<PropertyRecord> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    let Some(table) = document.select(&TABLE_SELECTOR).next() else {
        return records;
    };

    let mut rows = table.select(&ROW_SELECTOR);
    let Some(header_row) = rows.next() else {
        return records;
    };

    let headers: Vec<String> = header_row
        .select(&CELL_SELECTOR)
        .map(|c| c.text().collect::<String>().trim().to_string())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let parcel_col = column("Parcel ID").or_else(|| column("Parcel Number"));
    let year_col = column("Year Sold").or_else(|| column("Year"));
    let amount_col = column("Amount Bid at Tax Sale").or_else(|| column("Amount"));
    let name_col = column("Name");
    let desc_col = column("Description");

    let Some(parcel_col) = parcel_col else {
        warn!("ADOR table is missing a Parcel ID column");
        return records;
    };

    for row in rows {
        let cells: Vec<String> = row
            .select(&CELL_SELECTOR)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect();

        let cell = |idx: Option<usize>| {
            idx.and_then(|i| cells.get(i))
                .map(String::as_str)
                .unwrap_or("")
        };

        let parcel_id = cell(Some(parcel_col)).to_string();
        if parcel_id.is_empty() {
            continue;
        }

        let description = cell(desc_col).to_string();
        let owner = cell(name_col).to_string();
        let year = cell(year_col).to_string();

        records.push(PropertyRecord {
            parcel_id,
            county: county_name.to_string(),
            state: "AL".to_string(),
            owner_name: (!owner.is_empty()).then_some(owner),
            amount: parse_amount(cell(amount_col)),
            acreage: extract_acreage(&description),
            description,
            sale_type: "tax_lien".to_string(),
            year_sold: (!year.is_empty()).then_some(year),
            auction_date: None,
            data_source: "alabama_dor".to_string(),
            auction_platform: "ADOR Search".to_string(),
            scraped_at: Utc::now(),
        });
    }

    records
}

/// Click the pagination "Next" link. ADOR renders it as a plain anchor,
/// addressable only by text, so this goes through the DOM.
fn click_next_link(session: &BrowserSession) -> Result<(), AppError> {
    let js = r#"(function() {
        const links = Array.from(document.querySelectorAll('a'));
        const next = links.find(a => a.textContent.trim() === 'Next');
        if (next && !(next.className || '').includes('disabled')) {
            next.click();
            return true;
        }
        return false;
    })()"#;
    session.evaluate(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r#"
        <html><body>
        <table class="table-striped">
            <tr>
                <th>CS Number</th><th>Parcel ID</th><th>Year Sold</th>
                <th>Amount Bid at Tax Sale</th><th>Name</th><th>Description</th>
            </tr>
            <tr>
                <td>CS-1</td><td>63-01-001</td><td>2023</td>
                <td>$1,234.56</td><td>SMITH JANE</td><td>LOT 4 BLK 2, 1.25 ACRES</td>
            </tr>
            <tr>
                <td>CS-2</td><td>63-01-002</td><td>2024</td>
                <td>$890.00</td><td></td><td>NW QTR SEC 12</td>
            </tr>
            <tr>
                <td>CS-3</td><td></td><td>2024</td>
                <td>$1.00</td><td>NO PARCEL</td><td>skipped</td>
            </tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_results_table() {
        let records = parse_results_table(RESULTS_HTML, "Tuscaloosa");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.parcel_id, "63-01-001");
        assert_eq!(first.county, "Tuscaloosa");
        assert_eq!(first.state, "AL");
        assert_eq!(first.owner_name.as_deref(), Some("SMITH JANE"));
        assert_eq!(first.amount, 1234.56);
        assert_eq!(first.acreage, Some(1.25));
        assert_eq!(first.year_sold.as_deref(), Some("2023"));
        assert_eq!(first.sale_type, "tax_lien");
        assert_eq!(first.data_source, "alabama_dor");

        let second = &records[1];
        assert!(second.owner_name.is_none());
        assert!(second.acreage.is_none());
    }

    #[test]
    fn test_no_table_yields_nothing() {
        let html = "<html><body><div class='alert-warning'>No matching records</div></body></html>";
        assert!(!has_results_table(html));
        assert!(parse_results_table(html, "Baldwin").is_empty());
    }

    #[test]
    fn test_next_page_detection() {
        let with_next = r##"<ul class="pagination"><li><a href="#">Next</a></li></ul>"##;
        assert!(has_next_page(with_next));

        let disabled = r##"<ul class="pagination"><li class="disabled"><a href="#">Next</a></li></ul>"##;
        assert!(!has_next_page(disabled));

        let disabled_link = r##"<a class="page-link disabled" href="#">Next</a>"##;
        assert!(!has_next_page(disabled_link));

        let without = r##"<a href="#">Previous</a>"##;
        assert!(!has_next_page(without));
    }

}
