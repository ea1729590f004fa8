use crate::error::{ForecastError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_MA_WINDOW: usize = 14;
pub const DEFAULT_BAND: f64 = 0.2;
pub const DEFAULT_FORECAST_LOOKBACK_DAYS: i64 = 90;
pub const DEFAULT_LISTING_LOOKBACK_DAYS: i64 = 30;

/// Model parameters. Not caller-controlled: they are fixed per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Trailing moving-average window in days.
    #[serde(default = "default_ma_window")]
    pub ma_window: usize,

    /// Symmetric scenario band, as a fraction of the expected value.
    #[serde(default = "default_band")]
    pub band: f64,

    /// Default range length for the forecast endpoint when no start is given.
    #[serde(default = "default_forecast_lookback")]
    pub forecast_lookback_days: i64,

    /// Default range length for the overview when no start is given.
    #[serde(default = "default_listing_lookback")]
    pub listing_lookback_days: i64,
}

fn default_ma_window() -> usize {
    DEFAULT_MA_WINDOW
}

fn default_band() -> f64 {
    DEFAULT_BAND
}

fn default_forecast_lookback() -> i64 {
    DEFAULT_FORECAST_LOOKBACK_DAYS
}

fn default_listing_lookback() -> i64 {
    DEFAULT_LISTING_LOOKBACK_DAYS
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            ma_window: DEFAULT_MA_WINDOW,
            band: DEFAULT_BAND,
            forecast_lookback_days: DEFAULT_FORECAST_LOOKBACK_DAYS,
            listing_lookback_days: DEFAULT_LISTING_LOOKBACK_DAYS,
        }
    }
}

impl ForecastConfig {
    /// Defaults overridden by `FORECAST_MA_WINDOW`, `FORECAST_BAND`,
    /// `FORECAST_LOOKBACK_DAYS` and `LISTING_LOOKBACK_DAYS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = env_value("FORECAST_MA_WINDOW") {
            config.ma_window = parse_env("FORECAST_MA_WINDOW", &raw)?;
        }
        if let Some(raw) = env_value("FORECAST_BAND") {
            config.band = parse_env("FORECAST_BAND", &raw)?;
        }
        if let Some(raw) = env_value("FORECAST_LOOKBACK_DAYS") {
            config.forecast_lookback_days = parse_env("FORECAST_LOOKBACK_DAYS", &raw)?;
        }
        if let Some(raw) = env_value("LISTING_LOOKBACK_DAYS") {
            config.listing_lookback_days = parse_env("LISTING_LOOKBACK_DAYS", &raw)?;
        }

        config.validate()?;
        debug!(
            "Forecast config: window {} days, band {}",
            config.ma_window, config.band
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.ma_window)?;
        validate_band(self.band)?;

        if self.forecast_lookback_days < 0 || self.listing_lookback_days < 0 {
            return Err(ForecastError::Config(
                "Lookback days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_window_size(window_size: usize) -> Result<()> {
    if window_size < 1 {
        return Err(ForecastError::InvalidWindowSize(window_size));
    }
    Ok(())
}

pub fn validate_band(band: f64) -> Result<()> {
    if !(band > 0.0 && band < 1.0) {
        return Err(ForecastError::InvalidBand(band));
    }
    Ok(())
}

/// Where the CRM and marketing tables live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset: String,
    #[serde(default = "default_deals_table")]
    pub deals_table: String,
    #[serde(default = "default_overview_table")]
    pub overview_table: String,
}

fn default_deals_table() -> String {
    "rd_station__deals".to_string()
}

fn default_overview_table() -> String {
    "dashboard_overview_daily".to_string()
}

impl WarehouseConfig {
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            deals_table: default_deals_table(),
            overview_table: default_overview_table(),
        }
    }

    /// Reads `BQ_PROJECT_ID` and `BQ_DATASET` (both required) plus the optional
    /// `BQ_DEALS_TABLE` and `BQ_OVERVIEW_TABLE`.
    pub fn from_env() -> Result<Self> {
        let project_id = env_value("BQ_PROJECT_ID")
            .ok_or_else(|| ForecastError::Config("BQ_PROJECT_ID is not set".to_string()))?;
        let dataset = env_value("BQ_DATASET")
            .ok_or_else(|| ForecastError::Config("BQ_DATASET is not set".to_string()))?;

        let mut config = Self::new(project_id, dataset);
        if let Some(table) = env_value("BQ_DEALS_TABLE") {
            config.deals_table = table;
        }
        if let Some(table) = env_value("BQ_OVERVIEW_TABLE") {
            config.overview_table = table;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.project_id)?;
        validate_identifier(&self.dataset)?;
        validate_identifier(&self.deals_table)?;
        validate_identifier(&self.overview_table)?;
        Ok(())
    }

    pub fn deals(&self) -> String {
        self.qualified(&self.deals_table)
    }

    pub fn overview(&self) -> String {
        self.qualified(&self.overview_table)
    }

    fn qualified(&self, table: &str) -> String {
        format!("`{}.{}.{}`", self.project_id, self.dataset, table)
    }
}

/// Table paths are spliced into SQL text, so only plain identifier characters
/// are allowed.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ForecastError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

pub(crate) fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| ForecastError::Config(format!("Invalid value for {}: '{}'", key, raw)))
}
