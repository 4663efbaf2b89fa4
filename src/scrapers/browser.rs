//! Shared harness for the out-of-process runner binaries.
//!
//! Each runner drives a headless Chrome session synchronously, writes its
//! records to the JSON path the supervisor hands it, and reports its fate
//! through the process exit code.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use headless_chrome::{Browser, LaunchOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ScraperConfig;
use crate::models::PropertyRecord;
use crate::outcome::{classify_error_text, ExitOutcome};
use crate::utils::error::AppError;

/// Command-line contract between the supervisor and every runner binary.
#[derive(Debug, Parser)]
pub struct RunnerArgs {
    /// County to harvest
    pub county: String,

    /// Page ceiling for multi-page county sites
    #[arg(long, default_value_t = 50)]
    pub max_pages: u32,

    /// Path the result records are written to as a JSON array
    #[arg(long)]
    pub json_output: PathBuf,
}

/// Stderr-only logging so runner output never collides with the result file.
pub fn init_runner_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// A headless Chrome session scoped to one runner invocation.
///
/// The browser process is torn down when the session drops.
pub struct BrowserSession {
    _browser: Browser,
    tab: std::sync::Arc<headless_chrome::Tab>,
    timeout: Duration,
}

impl BrowserSession {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to create launch options: {e}")))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {e}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {e}")))?;

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| AppError::Browser(format!("Failed to set user agent: {e}")))?;

        Ok(Self {
            _browser: browser,
            tab,
            timeout: Duration::from_secs(config.request_timeout),
        })
    }

    pub fn navigate(&self, url: &str) -> Result<(), AppError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| AppError::Browser(format!("Navigation to {url} failed: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::Browser(format!("Page load of {url} failed: {e}")))?;
        Ok(())
    }

    /// Block until the selector matches, within the session timeout.
    /// Selector groups ("table, .alert") wait for whichever appears first.
    pub fn wait_for(&self, selector: &str) -> Result<(), AppError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, self.timeout)
            .map_err(|e| AppError::Browser(format!("Wait for '{selector}' timed out: {e}")))?;
        Ok(())
    }

    /// Full rendered document HTML.
    pub fn content(&self) -> Result<String, AppError> {
        self.tab
            .get_content()
            .map_err(|e| AppError::Browser(format!("Failed to get page content: {e}")))
    }

    pub fn click(&self, selector: &str) -> Result<(), AppError> {
        self.tab
            .find_element(selector)
            .map_err(|e| AppError::Browser(format!("Element '{selector}' not found: {e}")))?
            .click()
            .map_err(|e| AppError::Browser(format!("Click on '{selector}' failed: {e}")))?;
        Ok(())
    }

    /// Run a JS expression in the page, discarding the result.
    pub fn evaluate(&self, expression: &str) -> Result<(), AppError> {
        self.tab
            .evaluate(expression, false)
            .map_err(|e| AppError::Browser(format!("Script evaluation failed: {e}")))?;
        Ok(())
    }

    /// Set a `<select>` value and fire its change event.
    pub fn set_select_value(&self, selector: &str, value: &str) -> Result<(), AppError> {
        let js = format!(
            r#"(function() {{
                const el = document.querySelector('{selector}');
                if (!el) return false;
                el.value = '{value}';
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#
        );
        self.tab
            .evaluate(&js, false)
            .map_err(|e| AppError::Browser(format!("Select '{selector}' update failed: {e}")))?;
        Ok(())
    }

    pub fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Map a runner error onto its exit class.
///
/// County validation is the one hard-permanent case; everything else is
/// classified from the error text.
pub fn classify_runner_error(err: &AppError) -> ExitOutcome {
    match err {
        AppError::InvalidCounty(_) | AppError::Validation(_) => ExitOutcome::Permanent,
        other => classify_error_text(&other.to_string()),
    }
}

fn write_records(records: &[PropertyRecord], path: &Path) -> Result<(), AppError> {
    let json = serde_json::to_string(records)?;
    fs::write(path, json)?;
    Ok(())
}

/// Terminate the runner process: write the result file on success, log and
/// classify the error otherwise. The exit code is the whole report.
pub fn finish(result: Result<Vec<PropertyRecord>, AppError>, json_output: &Path) -> ! {
    match result {
        Ok(records) => {
            if let Err(e) = write_records(&records, json_output) {
                error!("Failed to write result file: {e}");
                std::process::exit(ExitOutcome::Transient.code());
            }
            info!("Wrote {} records to {}", records.len(), json_output.display());
            std::process::exit(ExitOutcome::Success.code());
        }
        Err(e) => {
            let outcome = classify_runner_error(&e);
            error!("{e}");
            std::process::exit(outcome.code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_record;

    #[test]
    fn test_runner_args_parse() {
        let args =
            RunnerArgs::try_parse_from(["runner", "Jefferson", "--json-output", "/tmp/out.json"])
                .unwrap();
        assert_eq!(args.county, "Jefferson");
        assert_eq!(args.max_pages, 50);
        assert_eq!(args.json_output, PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn test_runner_args_require_json_output() {
        assert!(RunnerArgs::try_parse_from(["runner", "Jefferson"]).is_err());
    }

    #[test]
    fn test_invalid_county_is_permanent() {
        let err = AppError::InvalidCounty("Foo".to_string());
        assert_eq!(classify_runner_error(&err), ExitOutcome::Permanent);
    }

    #[test]
    fn test_rate_limit_text_maps_to_cooldown_exit() {
        let err = AppError::Browser("server said 429 too many requests".to_string());
        assert_eq!(classify_runner_error(&err), ExitOutcome::RateLimited);
    }

    #[test]
    fn test_browser_errors_default_to_transient() {
        let err = AppError::Browser("Page load of x failed: tab crashed".to_string());
        assert_eq!(classify_runner_error(&err), ExitOutcome::Transient);
    }

    #[test]
    fn test_write_records_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.json");
        let records = vec![test_record("P-1"), test_record("P-2")];

        write_records(&records, &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: Vec<PropertyRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].parcel_id, "P-1");
    }
}
