//! Channel dispatch: one entry point that validates the request and routes
//! it to the in-process grid client or a supervised runner binary.

use std::path::PathBuf;

use tracing::info;

use crate::config::AppConfig;
use crate::models::ScrapeResult;
use crate::scrapers::arkansas::ArkansasClient;
use crate::scrapers::supervisor::{RunnerSpec, Supervisor};
use crate::scrapers::ScrapeChannel;
use crate::states::{get_state_config, ChannelKind, StateConfig};
use crate::utils::error::AppError;

pub struct ScraperFactory {
    config: AppConfig,
    supervisor: Supervisor,
}

impl ScraperFactory {
    pub fn new(config: AppConfig) -> Self {
        let supervisor = Supervisor::new(config.retry.clone());
        Self { config, supervisor }
    }

    /// Validate the request and run the harvest for one jurisdiction.
    ///
    /// Never returns `Err`: input errors (unknown state, inactive state,
    /// missing county) and dispatch failures all fold into the result's
    /// `error` field, so callers have exactly one failure signal to inspect.
    pub async fn scrape(&self, state: &str, county: Option<&str>) -> ScrapeResult {
        match self.dispatch(state, county).await {
            Ok(result) => result,
            Err(e) => ScrapeResult::failed(e.to_string()),
        }
    }

    async fn dispatch(
        &self,
        state: &str,
        county: Option<&str>,
    ) -> Result<ScrapeResult, AppError> {
        let state_config =
            get_state_config(state).ok_or_else(|| AppError::UnknownState(state.to_string()))?;

        if !state_config.is_active {
            return Err(AppError::Validation(format!(
                "{} ({}) scraper is not yet available",
                state_config.state_name, state_config.state_code
            )));
        }

        if state_config.requires_county && county.is_none() {
            return Err(AppError::Validation(format!(
                "County is required for {} ({})",
                state_config.state_name, state_config.state_code
            )));
        }

        info!(
            "Dispatching {} scrape (county: {})",
            state_config.state_code,
            county.unwrap_or("statewide")
        );

        match state_config.channel {
            ChannelKind::GridApi => {
                let client = ArkansasClient::new(&self.config.scraper, self.config.grid.clone())?;
                info!("Running {} channel in-process", client.channel_name());
                Ok(client.scrape(county).await)
            }
            ChannelKind::BrowserRunner => {
                // requires_county was checked above
                let county = county.ok_or_else(|| {
                    AppError::Validation(format!(
                        "County is required for {}",
                        state_config.state_code
                    ))
                })?;
                let spec = self.runner_spec(state_config, county)?;
                Ok(self.supervisor.run(&spec).await)
            }
        }
    }

    fn runner_spec(&self, state: &StateConfig, county: &str) -> Result<RunnerSpec, AppError> {
        Ok(RunnerSpec {
            program: self.runner_path(state.state_code)?,
            args: vec![
                county.to_string(),
                "--max-pages".to_string(),
                self.config.runners.max_pages.to_string(),
            ],
            timeout: state.runner_timeout,
            label: format!("{} scraper", state.state_code),
        })
    }

    /// Resolve the runner binary: configured directory first, falling back
    /// to the directory of the current executable.
    fn runner_path(&self, state_code: &str) -> Result<PathBuf, AppError> {
        let binary = match state_code {
            "AL" => "alabama-runner",
            "TX" => "texas-runner",
            "FL" => "florida-runner",
            other => {
                return Err(AppError::Internal(format!(
                    "no runner binary registered for {other}"
                )))
            }
        };

        let dir = match &self.config.runners.dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_exe()?
                .parent()
                .map(PathBuf::from)
                .ok_or_else(|| {
                    AppError::Internal("current executable has no parent directory".to_string())
                })?,
        };

        Ok(dir.join(binary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ScraperFactory {
        ScraperFactory::new(AppConfig::default())
    }

    #[tokio::test]
    async fn test_unknown_state_folds_into_the_result() {
        let result = factory().scrape("ZZ", None).await;
        let error = result.error.expect("unknown state must surface as an error");
        assert!(error.contains("Unknown state: ZZ"), "{error}");
        assert_eq!(result.items_found, 0);
    }

    #[tokio::test]
    async fn test_inactive_state_folds_into_the_result() {
        let result = factory().scrape("GA", Some("Fulton")).await;
        let error = result.error.expect("inactive state must surface as an error");
        assert!(error.contains("not yet available"), "{error}");
    }

    #[tokio::test]
    async fn test_county_required_for_browser_states() {
        for state in ["AL", "TX", "FL"] {
            let result = factory().scrape(state, None).await;
            let error = result.error.unwrap_or_default();
            assert!(error.contains("County is required"), "{state}: {error}");
        }
    }

    #[test]
    fn test_runner_path_uses_configured_dir() {
        let mut config = AppConfig::default();
        config.runners.dir = Some("/opt/deedscout/runners".to_string());
        let factory = ScraperFactory::new(config);

        let path = factory.runner_path("AL").unwrap();
        assert_eq!(path, PathBuf::from("/opt/deedscout/runners/alabama-runner"));
    }

    #[test]
    fn test_runner_path_rejects_states_without_runners() {
        assert!(factory().runner_path("AR").is_err());
    }
}
