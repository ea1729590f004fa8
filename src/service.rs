use crate::config::{ForecastConfig, WarehouseConfig};
use crate::error::Result;
use crate::extractor::extract_revenue_facts;
use crate::funnel::{
    crm_by_platform_query, overview_query, overview_totals, parse_crm_rows, parse_marketing_rows,
    platform_cards,
};
use crate::schema::{OverviewResponse, PlatformFilter, RevenueForecastResponse};
use crate::utils::{days_before, parse_optional_date, validate_date_range, PeriodPreset};
use crate::warehouse::QueryExecutor;
use crate::ForecastProcessor;
use chrono::{Local, NaiveDate};
use log::{error, info};
use serde::{Deserialize, Serialize};

/// Raw request parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(rename = "dateStart", default)]
    pub date_start: Option<String>,
    #[serde(rename = "dateEnd", default)]
    pub date_end: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// A validated request: dates parsed, defaults applied, range ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub platform: PlatformFilter,
}

impl ForecastRequest {
    pub fn new(start: NaiveDate, end: NaiveDate, platform: PlatformFilter) -> Self {
        Self {
            date_start: Some(start.format("%Y-%m-%d").to_string()),
            date_end: Some(end.format("%Y-%m-%d").to_string()),
            platform: Some(platform.as_str().to_string()),
        }
    }

    pub fn for_period(preset: PeriodPreset, today: NaiveDate, platform: PlatformFilter) -> Self {
        let (start, end) = preset.range(today);
        Self::new(start, end, platform)
    }

    /// Applies defaults (`end = today`, `start = today - lookback_days`) and
    /// rejects unparseable or inverted ranges before anything is queried.
    pub fn resolve(&self, today: NaiveDate, lookback_days: i64) -> Result<ResolvedRequest> {
        let end = parse_optional_date(self.date_end.as_deref())?.unwrap_or(today);
        let start = parse_optional_date(self.date_start.as_deref())?
            .unwrap_or_else(|| days_before(today, lookback_days));
        let platform = PlatformFilter::parse_optional(self.platform.as_deref())?;

        validate_date_range(start, end)?;

        Ok(ResolvedRequest {
            start,
            end,
            platform,
        })
    }
}

/// Request handler for the forecast and overview reads.
///
/// Holds only immutable configuration and the executor, so one instance can
/// serve any number of concurrent requests.
pub struct RevenueForecaster<E> {
    executor: E,
    warehouse: WarehouseConfig,
    config: ForecastConfig,
}

impl<E: QueryExecutor> RevenueForecaster<E> {
    pub fn new(executor: E, warehouse: WarehouseConfig, config: ForecastConfig) -> Result<Self> {
        warehouse.validate()?;
        config.validate()?;
        Ok(Self {
            executor,
            warehouse,
            config,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn revenue_forecast(
        &self,
        request: &ForecastRequest,
        today: NaiveDate,
    ) -> Result<RevenueForecastResponse> {
        let resolved = request.resolve(today, self.config.forecast_lookback_days)?;
        info!(
            "Revenue forecast {} to {} (platform {})",
            resolved.start, resolved.end, resolved.platform
        );

        let facts = extract_revenue_facts(
            &self.executor,
            &self.warehouse,
            resolved.start,
            resolved.end,
            resolved.platform,
        )
        .await?;

        ForecastProcessor::process(&facts, resolved.start, resolved.end, &self.config)
    }

    pub async fn revenue_forecast_today(
        &self,
        request: &ForecastRequest,
    ) -> Result<RevenueForecastResponse> {
        self.revenue_forecast(request, Local::now().date_naive()).await
    }

    /// Funnel overview. The marketing and CRM queries are independent and are
    /// issued concurrently.
    pub async fn overview(
        &self,
        request: &ForecastRequest,
        today: NaiveDate,
    ) -> Result<OverviewResponse> {
        let resolved = request.resolve(today, self.config.listing_lookback_days)?;
        info!(
            "Overview {} to {} (platform {})",
            resolved.start, resolved.end, resolved.platform
        );

        let marketing_query = overview_query(
            &self.warehouse,
            resolved.start,
            resolved.end,
            resolved.platform,
        );
        let crm_query = crm_by_platform_query(&self.warehouse, resolved.start, resolved.end);

        let (marketing_rows, crm_rows) = futures::try_join!(
            self.executor.execute(&marketing_query),
            self.executor.execute(&crm_query)
        )
        .map_err(|e| {
            error!("Overview query failed: {}", e);
            e
        })?;

        let platforms = parse_marketing_rows(&marketing_rows)?;
        let crm_by_platform = parse_crm_rows(&crm_rows);
        let total = overview_totals(&platforms, &crm_by_platform, resolved.platform);
        let cards = platform_cards(&platforms, &crm_by_platform, &total, resolved.platform);

        Ok(OverviewResponse {
            start: resolved.start,
            end: resolved.end,
            platform: resolved.platform,
            total,
            platforms,
            crm_by_platform,
            cards,
        })
    }
}
