use crate::classifier::{classify, sql_platform_predicate};
use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::ingestion::revenue_fact_from_row;
use crate::schema::{DealRecord, PlatformFilter, RevenueFact};
use crate::warehouse::{ParamValue, QueryExecutor, Row, WarehouseQuery};
use chrono::NaiveDate;
use log::{debug, error};
use std::collections::BTreeMap;

/// Won deals with a win timestamp inside `[@date_start, @date_end]`.
///
/// `win` may be stored as BOOL or STRING; casting to string covers both.
pub const WON_DEALS_PREDICATE: &str = "LOWER(CAST(win AS STRING)) = 'true' \
     AND win_at IS NOT NULL \
     AND DATE(win_at) BETWEEN @date_start AND @date_end";

pub const SOURCE_COLUMN: &str = "deal_source_name";

pub fn revenue_facts_query(
    tables: &WarehouseConfig,
    start: NaiveDate,
    end: NaiveDate,
    platform: PlatformFilter,
) -> WarehouseQuery {
    let sql = format!(
        "SELECT DATE(win_at) AS date, \
         SUM(IFNULL(SAFE_CAST(amount_total AS FLOAT64), 0)) AS revenue_actual \
         FROM {table} \
         WHERE {won} AND {platform} \
         GROUP BY date \
         ORDER BY date ASC",
        table = tables.deals(),
        won = WON_DEALS_PREDICATE,
        platform = sql_platform_predicate(SOURCE_COLUMN, "platform"),
    );

    WarehouseQuery::new(sql)
        .bind("date_start", ParamValue::Date(start))
        .bind("date_end", ParamValue::Date(end))
        .bind("platform", ParamValue::String(platform.as_str().to_string()))
}

/// Reads `(date, revenue_actual)` rows into facts sorted by date.
///
/// Rows with a null date or outside `[start, end]` are dropped and rows that
/// share a date are summed, so the result holds at most one fact per day.
pub fn parse_revenue_rows(rows: &[Row], start: NaiveDate, end: NaiveDate) -> Result<Vec<RevenueFact>> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for row in rows {
        if let Some(fact) = revenue_fact_from_row(row)? {
            if fact.date < start || fact.date > end {
                continue;
            }
            *by_date.entry(fact.date).or_insert(0.0) += fact.revenue_actual;
        }
    }

    Ok(by_date
        .into_iter()
        .map(|(date, revenue_actual)| RevenueFact {
            date,
            revenue_actual,
        })
        .collect())
}

/// Daily won-deal revenue from the warehouse. Failures are logged and
/// returned unchanged.
pub async fn extract_revenue_facts<E: QueryExecutor>(
    executor: &E,
    tables: &WarehouseConfig,
    start: NaiveDate,
    end: NaiveDate,
    platform: PlatformFilter,
) -> Result<Vec<RevenueFact>> {
    let query = revenue_facts_query(tables, start, end, platform);

    let rows = executor.execute(&query).await.map_err(|e| {
        error!("Revenue fact query failed: {}", e);
        e
    })?;

    let facts = parse_revenue_rows(&rows, start, end)?;
    debug!(
        "Extracted {} revenue days from {} rows (platform {})",
        facts.len(),
        rows.len(),
        platform
    );
    Ok(facts)
}

pub fn is_won_in_range(deal: &DealRecord, start: NaiveDate, end: NaiveDate) -> bool {
    deal.win
        && deal
            .win_date
            .map(|d| d >= start && d <= end)
            .unwrap_or(false)
}

/// Same facts as [`extract_revenue_facts`], computed over deals that are
/// already in memory.
pub fn revenue_facts_from_deals(
    deals: &[DealRecord],
    start: NaiveDate,
    end: NaiveDate,
    platform: PlatformFilter,
) -> Vec<RevenueFact> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for deal in deals {
        if !is_won_in_range(deal, start, end) {
            continue;
        }
        if !platform.matches(classify(deal.deal_source_name.as_deref())) {
            continue;
        }
        if let Some(date) = deal.win_date {
            *by_date.entry(date).or_insert(0.0) += deal.amount_total;
        }
    }

    by_date
        .into_iter()
        .map(|(date, revenue_actual)| RevenueFact {
            date,
            revenue_actual,
        })
        .collect()
}
