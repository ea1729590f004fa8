use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Date parsing error: {0}")]
    DateError(String),

    #[error("Unknown platform '{0}': expected all, google_ads, meta_ads, linkedin_ads or other")]
    InvalidPlatform(String),

    #[error("Invalid moving-average window {0}: must be at least 1")]
    InvalidWindowSize(usize),

    #[error("Invalid band {0}: must be strictly between 0.0 and 1.0")]
    InvalidBand(f64),

    #[error("Invalid warehouse identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Warehouse query failed: {0}")]
    Query(String),

    #[cfg(feature = "bigquery")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ForecastError {
    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDateRange { .. }
                | Self::DateError(_)
                | Self::InvalidPlatform(_)
                | Self::InvalidWindowSize(_)
                | Self::InvalidBand(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
