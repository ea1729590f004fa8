//! # CRM Revenue Forecast
//!
//! Turns won CRM deals stored in a data warehouse into a dense daily revenue
//! series with an expected value, optimistic/pessimistic scenario bands and a
//! backward-looking accuracy score.
//!
//! ## Core Concepts
//!
//! - **Revenue Facts**: won-deal revenue summed per calendar day. Days without a
//!   won deal have no fact at all, which is different from a fact of zero.
//! - **Densified Days**: one entry per day of the requested range, carrying the
//!   filled revenue (0 when absent) and the raw revenue (`Present` or `Absent`)
//! - **Expected Revenue**: trailing moving average of the raw revenue over the
//!   last `ma_window` days, skipping absent days
//! - **Scenario Band**: `expected * (1 ± band)`
//! - **Accuracy Rate**: `1 - MAPE` over the last `ma_window` days, clamped to `[0, 1]`
//! - **Platform Buckets**: deal source labels classified into Google, Meta,
//!   LinkedIn or other by keyword
//!
//! ## Example
//!
//! ```rust,ignore
//! use crm_revenue_forecast::*;
//! use chrono::NaiveDate;
//!
//! let facts = vec![
//!     RevenueFact {
//!         date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         revenue_actual: 100.0,
//!     },
//!     RevenueFact {
//!         date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
//!         revenue_actual: 300.0,
//!     },
//! ];
//!
//! let forecast = build_revenue_forecast(
//!     &facts,
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//!     &ForecastConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(forecast.series.len(), 31);
//! ```

pub mod accuracy;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod funnel;
pub mod ingestion;
pub mod schema;
pub mod service;
pub mod utils;
pub mod warehouse;

pub use accuracy::score;
pub use classifier::{classify, sql_bucket_expression};
pub use config::{ForecastConfig, WarehouseConfig};
pub use engine::{densify, project, DensifiedDay, MovingAverageProjector, RawRevenue};
pub use error::{ForecastError, Result};
pub use extractor::{extract_revenue_facts, revenue_facts_from_deals};
pub use schema::*;
pub use service::{ForecastRequest, ResolvedRequest, RevenueForecaster};
pub use utils::PeriodPreset;
pub use warehouse::{ParamValue, QueryExecutor, QueryParam, Row, WarehouseQuery};

use chrono::NaiveDate;
use log::{debug, info};

pub struct ForecastProcessor;

impl ForecastProcessor {
    /// Densifies `facts` over `[start, end]`, projects the moving average and
    /// scores the tail of the series.
    pub fn process(
        facts: &[RevenueFact],
        start: NaiveDate,
        end: NaiveDate,
        config: &ForecastConfig,
    ) -> Result<RevenueForecastResponse> {
        config.validate()?;

        info!(
            "Building revenue forecast from {} to {} ({} revenue days)",
            start,
            end,
            facts.len()
        );

        let days = densify(facts, start, end)?;
        let projector = MovingAverageProjector::new(config.ma_window, config.band)?;
        let series = projector.project(&days);
        let accuracy_rate = score(&series, config.ma_window, end);

        debug!(
            "Forecast series has {} points, accuracy {:.4}",
            series.len(),
            accuracy_rate
        );

        Ok(RevenueForecastResponse {
            start,
            end,
            ma_window: config.ma_window,
            band: config.band,
            horizon: 0,
            accuracy_rate,
            series,
        })
    }
}

pub fn build_revenue_forecast(
    facts: &[RevenueFact],
    start: NaiveDate,
    end: NaiveDate,
    config: &ForecastConfig,
) -> Result<RevenueForecastResponse> {
    ForecastProcessor::process(facts, start, end, config)
}
