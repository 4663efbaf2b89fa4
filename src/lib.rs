pub mod config;
pub mod counties;
pub mod models;
pub mod outcome;
pub mod scrapers;
pub mod snapshot;
pub mod states;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{PropertyRecord, RetryAttempt, ScrapeResult};
pub use outcome::ExitOutcome;
pub use scrapers::factory::ScraperFactory;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
