use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub runners: RunnersConfig,
}

/// Shared scrape behavior: fingerprint and per-attempt budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Per-request timeout for the HTTP channel, seconds.
    pub request_timeout: u64,
    pub chrome_path: Option<String>,
}

/// Subprocess supervisor retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fixed extended cooldown applied on rate-limited attempts.
    pub rate_limit_delay_ms: u64,
    /// Grace period between SIGTERM and SIGKILL on timeout.
    pub term_grace_ms: u64,
}

/// Paginated grid API channel (Arkansas COSL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub base_url: String,
    pub page_size: usize,
    pub max_pages: u32,
    /// Politeness delay between successive pages, milliseconds.
    pub page_delay_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub dir: String,
}

/// Where the out-of-process runner binaries live and their page ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnersConfig {
    /// Directory containing the runner binaries; defaults to the directory
    /// of the current executable when empty.
    pub dir: Option<String>,
    pub max_pages: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "DEEDSCOUT"
            .add_source(Environment::with_prefix("DEEDSCOUT").separator("__"))
            .build()?;

        // Section defaults fill anything the file/env sources leave unset
        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.user_agent.is_empty() {
            return Err(ConfigError::Message("Scraper user_agent must not be empty".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Scraper request_timeout must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Retry max_attempts must be greater than 0".into(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Message(
                "Retry base_delay_ms cannot exceed max_delay_ms".into(),
            ));
        }

        if self.grid.page_size == 0 {
            return Err(ConfigError::Message("Grid page_size must be greater than 0".into()));
        }

        if self.grid.max_pages == 0 {
            return Err(ConfigError::Message("Grid max_pages must be greater than 0".into()));
        }

        if url::Url::parse(&self.grid.base_url).is_err() {
            return Err(ConfigError::Message("Invalid grid base_url format".into()));
        }

        if self.runners.max_pages == 0 {
            return Err(ConfigError::Message(
                "Runners max_pages must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout: 30,
            chrome_path: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            rate_limit_delay_ms: 60_000,
            term_grace_ms: 5_000,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            base_url: "https://auction.cosl.org".to_string(),
            page_size: 500,
            max_pages: 100,
            page_delay_ms: 500,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            rate_limit_delay_ms: 60_000,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: "debug_failures".to_string(),
        }
    }
}

impl Default for RunnersConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_pages: 50,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn term_grace(&self) -> Duration {
        Duration::from_millis(self.term_grace_ms)
    }
}
