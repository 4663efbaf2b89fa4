use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown state: {0}")]
    UnknownState(String),

    #[error("Invalid county: {0}")]
    InvalidCounty(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_invalid_county_message() {
        let err = AppError::InvalidCounty("Foo".to_string());
        assert_eq!(err.to_string(), "Invalid county: Foo");
    }

    #[test]
    fn test_unknown_state_message() {
        let err = AppError::UnknownState("ZZ".to_string());
        assert_eq!(err.to_string(), "Unknown state: ZZ");
    }
}
