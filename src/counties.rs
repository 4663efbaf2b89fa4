//! Static county lookup tables for each jurisdiction.
//!
//! These are immutable process-wide state: built once behind `LazyLock`,
//! shared by reference. Normalization resolves user input in three steps
//! (exact code, exact name, then prefix/substring fallback), and an
//! unresolvable county is a fatal input error, never retried.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::utils::error::AppError;

/// Arkansas county FIPS codes (75 counties), as used by the COSL grid API.
pub static ARKANSAS_COUNTIES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("001", "Arkansas"),
            ("003", "Ashley"),
            ("005", "Baxter"),
            ("007", "Benton"),
            ("009", "Boone"),
            ("011", "Bradley"),
            ("013", "Calhoun"),
            ("015", "Carroll"),
            ("017", "Chicot"),
            ("019", "Clark"),
            ("021", "Clay"),
            ("023", "Cleburne"),
            ("025", "Cleveland"),
            ("027", "Columbia"),
            ("029", "Conway"),
            ("031", "Craighead"),
            ("033", "Crawford"),
            ("035", "Crittenden"),
            ("037", "Cross"),
            ("039", "Dallas"),
            ("041", "Desha"),
            ("043", "Drew"),
            ("045", "Faulkner"),
            ("047", "Franklin"),
            ("049", "Fulton"),
            ("051", "Garland"),
            ("053", "Grant"),
            ("055", "Greene"),
            ("057", "Hempstead"),
            ("059", "Hot Spring"),
            ("061", "Howard"),
            ("063", "Independence"),
            ("065", "Izard"),
            ("067", "Jackson"),
            ("069", "Jefferson"),
            ("071", "Johnson"),
            ("073", "Lafayette"),
            ("075", "Lawrence"),
            ("077", "Lee"),
            ("079", "Lincoln"),
            ("081", "Little River"),
            ("083", "Logan"),
            ("085", "Lonoke"),
            ("087", "Madison"),
            ("089", "Marion"),
            ("091", "Miller"),
            ("093", "Mississippi"),
            ("095", "Monroe"),
            ("097", "Montgomery"),
            ("099", "Nevada"),
            ("101", "Newton"),
            ("103", "Ouachita"),
            ("105", "Perry"),
            ("107", "Phillips"),
            ("109", "Pike"),
            ("111", "Poinsett"),
            ("113", "Polk"),
            ("115", "Pope"),
            ("117", "Prairie"),
            ("119", "Pulaski"),
            ("121", "Randolph"),
            ("123", "St. Francis"),
            ("125", "Saline"),
            ("127", "Scott"),
            ("129", "Searcy"),
            ("131", "Sebastian"),
            ("133", "Sevier"),
            ("135", "Sharp"),
            ("137", "Stone"),
            ("139", "Union"),
            ("141", "Van Buren"),
            ("143", "Washington"),
            ("145", "White"),
            ("147", "Woodruff"),
            ("149", "Yell"),
        ])
    });

/// Alabama ADOR county codes. ADOR assigns codes alphabetically with a few
/// legacy exceptions (Jefferson split, Mobile, Montgomery), not FIPS.
pub static ALABAMA_COUNTY_CODES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("04", "Autauga"),
            ("05", "Baldwin"),
            ("06", "Barbour"),
            ("07", "Bibb"),
            ("08", "Blount"),
            ("09", "Bullock"),
            ("10", "Butler"),
            ("11", "Calhoun"),
            ("12", "Chambers"),
            ("13", "Cherokee"),
            ("14", "Chilton"),
            ("15", "Choctaw"),
            ("16", "Clarke"),
            ("17", "Clay"),
            ("18", "Cleburne"),
            ("19", "Coffee"),
            ("20", "Colbert"),
            ("21", "Conecuh"),
            ("22", "Coosa"),
            ("23", "Covington"),
            ("24", "Crenshaw"),
            ("25", "Cullman"),
            ("26", "Dale"),
            ("27", "Dallas"),
            ("28", "DeKalb"),
            ("29", "Elmore"),
            ("30", "Escambia"),
            ("31", "Etowah"),
            ("32", "Fayette"),
            ("33", "Franklin"),
            ("34", "Geneva"),
            ("35", "Greene"),
            ("36", "Hale"),
            ("37", "Henry"),
            ("38", "Houston"),
            ("39", "Jackson"),
            ("68", "Jefferson-Bess"),
            ("01", "Jefferson-Bham"),
            ("40", "Lamar"),
            ("41", "Lauderdale"),
            ("42", "Lawrence"),
            ("43", "Lee"),
            ("44", "Limestone"),
            ("45", "Lowndes"),
            ("46", "Macon"),
            ("47", "Madison"),
            ("48", "Marengo"),
            ("49", "Marion"),
            ("50", "Marshall"),
            ("02", "Mobile"),
            ("51", "Monroe"),
            ("03", "Montgomery"),
            ("52", "Morgan"),
            ("53", "Perry"),
            ("54", "Pickens"),
            ("55", "Pike"),
            ("56", "Randolph"),
            ("57", "Russell"),
            ("58", "Shelby"),
            ("59", "St_Clair"),
            ("60", "Sumter"),
            ("61", "Talladega"),
            ("62", "Tallapoosa"),
            ("63", "Tuscaloosa"),
            ("64", "Walker"),
            ("65", "Washington"),
            ("66", "Wilcox"),
            ("67", "Winston"),
        ])
    });

static ALABAMA_NAME_TO_CODE: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    ALABAMA_COUNTY_CODES
        .iter()
        .map(|(code, name)| (name.to_uppercase(), *code))
        .collect()
});

/// How a county site presents its listings, driving the runner's parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteFormat {
    /// Harris County tax office: key/value table cards.
    HarrisTax,
    /// El Paso sheriff sales: plain HTML tables.
    ElPasoHtml,
    /// RealAuction / RealTaxDeed calendar sites.
    RealAuction,
    /// GovEase: registration-walled, cannot be scraped anonymously.
    GovEase,
    /// Unrecognized layout; the generic table heuristic is attempted.
    Generic,
}

/// A browser-scraped county: entry-point URL plus its page format.
#[derive(Debug, Clone)]
pub struct CountySite {
    pub key: &'static str,
    pub name: &'static str,
    pub listing_url: &'static str,
    pub format: SiteFormat,
}

/// Texas counties with known tax-sale sites. Texas has no centralized
/// system; each county picks its own platform.
pub static TEXAS_COUNTIES: LazyLock<Vec<CountySite>> = LazyLock::new(|| {
    vec![
        CountySite {
            key: "harris",
            name: "Harris",
            listing_url: "https://www.hctax.net/Property/listings/taxsalelisting",
            format: SiteFormat::HarrisTax,
        },
        CountySite {
            key: "dallas",
            name: "Dallas",
            listing_url: "https://dallas.texas.sheriffsaleauctions.com",
            format: SiteFormat::RealAuction,
        },
        CountySite {
            key: "tarrant",
            name: "Tarrant",
            listing_url: "https://www.tarrantcountytx.gov/en/constables/constable-3/delinquent-tax-sales/monthly-tax-sales-listings.html",
            format: SiteFormat::Generic,
        },
        CountySite {
            key: "travis",
            name: "Travis",
            listing_url: "https://travis.texas.realforeclose.com/index.cfm?zaction=USER&zmethod=CALENDAR",
            format: SiteFormat::RealAuction,
        },
        CountySite {
            key: "collin",
            name: "Collin",
            listing_url: "https://www.collincountytx.gov/Courts/Constables/constable-sales",
            format: SiteFormat::Generic,
        },
        CountySite {
            key: "denton",
            name: "Denton",
            listing_url: "https://www.govease.com",
            format: SiteFormat::GovEase,
        },
        CountySite {
            key: "el_paso",
            name: "El Paso",
            listing_url: "https://www.epcounty.com/sheriff/cp_sales.htm",
            format: SiteFormat::ElPasoHtml,
        },
        CountySite {
            key: "fort_bend",
            name: "Fort Bend",
            listing_url: "https://www.fortbendcountytx.gov/government/departments/constables/constable-precinct-4/tax-and-property-sales",
            format: SiteFormat::Generic,
        },
    ]
});

/// Florida counties on the RealTaxDeed calendar platform.
pub static FLORIDA_COUNTIES: LazyLock<Vec<CountySite>> = LazyLock::new(|| {
    vec![
        CountySite {
            key: "orange",
            name: "Orange",
            listing_url: "https://orange.realtaxdeed.com/index.cfm?zaction=USER&zmethod=CALENDAR",
            format: SiteFormat::RealAuction,
        },
        CountySite {
            key: "miami_dade",
            name: "Miami-Dade",
            listing_url: "https://www.miamidade.realforeclose.com/index.cfm?zaction=USER&zmethod=CALENDAR",
            format: SiteFormat::RealAuction,
        },
        CountySite {
            key: "hillsborough",
            name: "Hillsborough",
            listing_url: "https://hillsborough.realtaxdeed.com/index.cfm?zaction=USER&zmethod=CALENDAR",
            format: SiteFormat::RealAuction,
        },
        CountySite {
            key: "duval",
            name: "Duval",
            listing_url: "https://duval.realtaxdeed.com/index.cfm?zaction=USER&zmethod=CALENDAR",
            format: SiteFormat::RealAuction,
        },
    ]
});

/// Normalize Alabama county input (2-digit ADOR code or name) to its code.
pub fn normalize_alabama_county(input: &str) -> Result<&'static str, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidCounty(
            "county is required for Alabama search".to_string(),
        ));
    }

    // Numeric code
    if trimmed.chars().all(|c| c.is_ascii_digit()) && trimmed.len() <= 2 {
        let code = format!("{:0>2}", trimmed);
        if let Some((key, _)) = ALABAMA_COUNTY_CODES.get_key_value(code.as_str()) {
            return Ok(key);
        }
    }

    // Exact name match (case-insensitive)
    let upper = trimmed.to_uppercase();
    if let Some(code) = ALABAMA_NAME_TO_CODE.get(&upper) {
        return Ok(code);
    }

    // Prefix/substring fallback
    for (name, code) in ALABAMA_NAME_TO_CODE.iter() {
        if name.contains(&upper) || name.starts_with(&upper) {
            return Ok(code);
        }
    }

    Err(AppError::InvalidCounty(format!(
        "invalid Alabama county: {trimmed}"
    )))
}

fn normalize_site(input: &str, sites: &'static [CountySite], state: &str) -> Result<&'static CountySite, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidCounty(format!(
            "county is required for {state} search"
        )));
    }

    let normalized = trimmed.to_uppercase().replace(['-', ' '], "_");
    let simplified = normalized.replace('_', "");

    // Exact key or name match, tolerating separator variations
    for site in sites {
        let key_upper = site.key.to_uppercase();
        let name_norm = site.name.to_uppercase().replace(['-', ' '], "_");
        if normalized == key_upper
            || normalized == name_norm
            || simplified == key_upper.replace('_', "")
        {
            return Ok(site);
        }
    }

    // Prefix fallback
    for site in sites {
        let key_upper = site.key.to_uppercase();
        if normalized.starts_with(&key_upper) || key_upper.starts_with(&normalized) {
            return Ok(site);
        }
    }

    let supported: Vec<&str> = sites.iter().map(|s| s.name).collect();
    Err(AppError::InvalidCounty(format!(
        "invalid {state} county: {trimmed}. Supported counties: {}",
        supported.join(", ")
    )))
}

/// Resolve a Texas county to its site configuration.
pub fn normalize_texas_county(input: &str) -> Result<&'static CountySite, AppError> {
    normalize_site(input, &TEXAS_COUNTIES, "Texas")
}

/// Resolve a Florida county to its site configuration.
pub fn normalize_florida_county(input: &str) -> Result<&'static CountySite, AppError> {
    normalize_site(input, &FLORIDA_COUNTIES, "Florida")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes() {
        assert_eq!(ARKANSAS_COUNTIES.len(), 75);
        assert_eq!(ALABAMA_COUNTY_CODES.len(), 67);
        assert_eq!(TEXAS_COUNTIES.len(), 8);
        assert_eq!(FLORIDA_COUNTIES.len(), 4);
    }

    #[test]
    fn test_alabama_code_lookup() {
        assert_eq!(normalize_alabama_county("05").unwrap(), "05");
        assert_eq!(normalize_alabama_county("5").unwrap(), "05");
    }

    #[test]
    fn test_alabama_name_lookup() {
        assert_eq!(normalize_alabama_county("Baldwin").unwrap(), "05");
        assert_eq!(normalize_alabama_county("BALDWIN").unwrap(), "05");
        assert_eq!(normalize_alabama_county("  baldwin  ").unwrap(), "05");
    }

    #[test]
    fn test_alabama_prefix_fallback() {
        assert_eq!(normalize_alabama_county("Tusca").unwrap(), "63");
    }

    #[test]
    fn test_alabama_invalid_county() {
        let err = normalize_alabama_county("Atlantis").unwrap_err();
        assert!(err.to_string().contains("invalid Alabama county: Atlantis"));

        let err = normalize_alabama_county("").unwrap_err();
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_texas_name_variations() {
        assert_eq!(normalize_texas_county("Harris").unwrap().key, "harris");
        assert_eq!(normalize_texas_county("EL PASO").unwrap().key, "el_paso");
        assert_eq!(normalize_texas_county("el-paso").unwrap().key, "el_paso");
        assert_eq!(normalize_texas_county("elpaso").unwrap().key, "el_paso");
        assert_eq!(normalize_texas_county("Fort Bend").unwrap().key, "fort_bend");
    }

    #[test]
    fn test_texas_invalid_county_lists_supported() {
        let err = normalize_texas_county("Bexar").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid Texas county: Bexar"));
        assert!(msg.contains("Harris"));
    }

    #[test]
    fn test_florida_separator_variations() {
        assert_eq!(normalize_florida_county("Miami-Dade").unwrap().key, "miami_dade");
        assert_eq!(normalize_florida_county("MIAMI DADE").unwrap().key, "miami_dade");
        assert_eq!(normalize_florida_county("miamidade").unwrap().key, "miami_dade");
        assert_eq!(normalize_florida_county("Orange").unwrap().key, "orange");
    }
}
