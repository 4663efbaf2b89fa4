use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

/// Which scrape strategy a jurisdiction uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Async HTTP client against a paginated JSON grid API, in-process.
    GridApi,
    /// Standalone runner binary driving a headless browser, out-of-process.
    BrowserRunner,
}

/// Per-jurisdiction configuration: sale mechanics plus channel dispatch.
///
/// Built once at startup and shared by reference; never rebuilt per call.
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub state_code: &'static str,
    pub state_name: &'static str,
    pub sale_type: &'static str,
    pub redemption_period_days: u32,
    pub time_to_ownership_days: u32,
    pub auction_platform: &'static str,
    pub channel: ChannelKind,
    /// County-based systems cannot be scraped statewide.
    pub requires_county: bool,
    pub is_active: bool,
    /// Wall-clock budget for one runner attempt.
    pub runner_timeout: Duration,
    pub notes: &'static str,
}

static STATE_CONFIGS: LazyLock<HashMap<&'static str, StateConfig>> = LazyLock::new(|| {
    let configs = [
        StateConfig {
            state_code: "AR",
            state_name: "Arkansas",
            sale_type: "tax_deed",
            redemption_period_days: 30,
            time_to_ownership_days: 180,
            auction_platform: "COSL Website",
            channel: ChannelKind::GridApi,
            requires_county: false,
            is_active: true,
            runner_timeout: Duration::from_secs(180),
            notes: "Centralized state system. Limited warranty deed; quiet title required for title insurance.",
        },
        StateConfig {
            state_code: "AL",
            state_name: "Alabama",
            sale_type: "tax_lien",
            redemption_period_days: 1460,
            time_to_ownership_days: 2000,
            auction_platform: "ADOR Search",
            channel: ChannelKind::BrowserRunner,
            requires_county: true,
            is_active: true,
            runner_timeout: Duration::from_secs(180),
            notes: "County-based lien system, 4-year redemption at 12% interest.",
        },
        StateConfig {
            state_code: "TX",
            state_name: "Texas",
            sale_type: "redeemable_deed",
            redemption_period_days: 180,
            time_to_ownership_days: 180,
            auction_platform: "County-specific",
            channel: ChannelKind::BrowserRunner,
            requires_county: true,
            is_active: true,
            runner_timeout: Duration::from_secs(300),
            notes: "No centralized system; each county runs its own sale site.",
        },
        StateConfig {
            state_code: "FL",
            state_name: "Florida",
            sale_type: "hybrid",
            redemption_period_days: 0,
            time_to_ownership_days: 730,
            auction_platform: "RealTaxDeed",
            channel: ChannelKind::BrowserRunner,
            requires_county: true,
            is_active: true,
            runner_timeout: Duration::from_secs(300),
            notes: "Lien-then-deed hybrid; deed auctions on county RealTaxDeed sites.",
        },
        StateConfig {
            state_code: "GA",
            state_name: "Georgia",
            sale_type: "redeemable_deed",
            redemption_period_days: 365,
            time_to_ownership_days: 400,
            auction_platform: "County courthouse",
            channel: ChannelKind::BrowserRunner,
            requires_county: true,
            is_active: false,
            runner_timeout: Duration::from_secs(300),
            notes: "Scraper not yet implemented.",
        },
    ];

    configs.into_iter().map(|c| (c.state_code, c)).collect()
});

/// Look up a jurisdiction by two-letter code (case-insensitive).
pub fn get_state_config(state_code: &str) -> Option<&'static StateConfig> {
    STATE_CONFIGS.get(state_code.to_uppercase().as_str())
}

/// All jurisdictions with a working scraper, sorted by code.
pub fn active_states() -> Vec<&'static StateConfig> {
    let mut states: Vec<_> = STATE_CONFIGS.values().filter(|c| c.is_active).collect();
    states.sort_by_key(|c| c.state_code);
    states
}
