//! Normalizes warehouse cells into the crate's canonical types.
//!
//! The warehouse client may hand back a date as `"2024-03-05"`, as a
//! `{ "value": "2024-03-05" }` wrapper, or as epoch seconds; amounts as JSON
//! numbers or numeric strings; the `win` flag as a boolean or as a string.
//! Everything past this module sees `NaiveDate`, `f64` and `bool` only.

use crate::error::{ForecastError, Result};
use crate::schema::{CrmPlatformTotals, DealRecord, MarketingRow, PlatformBucket, RevenueFact};
use crate::utils::parse_calendar_date;
use crate::warehouse::Row;
use chrono::{DateTime, NaiveDate};
use log::warn;
use serde_json::Value;

/// Strips a `{ "value": ... }` wrapper if present.
pub fn unwrap_cell(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("value").unwrap_or(value),
        _ => value,
    }
}

pub fn cell_as_string(value: &Value) -> Option<String> {
    match unwrap_cell(value) {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Numeric cell; null, missing or unparseable values count as zero.
pub fn cell_as_f64(value: &Value) -> f64 {
    match unwrap_cell(value) {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                if !s.trim().is_empty() {
                    warn!("Treating non-numeric amount '{}' as 0", s);
                }
                0.0
            }
        },
        _ => 0.0,
    }
}

/// Boolean-or-string truthiness: `true` or any casing of `"true"`.
pub fn cell_is_true(value: &Value) -> bool {
    match unwrap_cell(value) {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Calendar date of a DATE, DATETIME or TIMESTAMP cell. Null is `None`.
pub fn cell_as_date(value: &Value) -> Result<Option<NaiveDate>> {
    match unwrap_cell(value) {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            if looks_like_epoch(trimmed) {
                epoch_to_date(trimmed.parse::<f64>().unwrap_or_default()).map(Some)
            } else {
                parse_calendar_date(trimmed).map(Some)
            }
        }
        Value::Number(n) => epoch_to_date(n.as_f64().unwrap_or_default()).map(Some),
        other => Err(ForecastError::DateError(format!(
            "Unsupported date cell: {}",
            other
        ))),
    }
}

/// Epoch seconds arrive either in float notation (`1.7152632E9`) or as a
/// plain integer of at least 9 digits; shorter digit runs such as `20240305`
/// are left to the calendar parser.
fn looks_like_epoch(s: &str) -> bool {
    let Ok(seconds) = s.parse::<f64>() else {
        return false;
    };
    if !seconds.is_finite() {
        return false;
    }
    let digits = s.trim_start_matches(['-', '+']);
    s.contains(['.', 'e', 'E'])
        || (digits.len() >= MIN_EPOCH_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()))
}

const MIN_EPOCH_DIGITS: usize = 9;

fn epoch_to_date(seconds: f64) -> Result<NaiveDate> {
    if !seconds.is_finite() {
        return Err(ForecastError::DateError(format!(
            "Timestamp is not a number: {}",
            seconds
        )));
    }
    DateTime::from_timestamp(seconds.floor() as i64, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| ForecastError::DateError(format!("Timestamp out of range: {}", seconds)))
}

static NULL: Value = Value::Null;

fn field<'a>(row: &'a Row, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&NULL)
}

pub fn deal_from_row(row: &Row) -> Result<DealRecord> {
    Ok(DealRecord {
        id: cell_as_string(field(row, "id")).unwrap_or_default(),
        win: cell_is_true(field(row, "win")),
        win_date: cell_as_date(field(row, "win_at"))?,
        amount_total: cell_as_f64(field(row, "amount_total")),
        deal_source_name: cell_as_string(field(row, "deal_source_name")),
    })
}

pub fn revenue_fact_from_row(row: &Row) -> Result<Option<RevenueFact>> {
    let date = cell_as_date(field(row, "date"))?;
    Ok(date.map(|date| RevenueFact {
        date,
        revenue_actual: cell_as_f64(field(row, "revenue_actual")),
    }))
}

pub fn marketing_row_from_row(row: &Row) -> Result<MarketingRow> {
    Ok(MarketingRow {
        date: cell_as_date(field(row, "date"))?,
        platform: cell_as_string(field(row, "platform")),
        leads: cell_as_f64(field(row, "leads")),
        qualified_leads: cell_as_f64(field(row, "qualified_leads")),
        opportunities: cell_as_f64(field(row, "opportunities")),
        sales: cell_as_f64(field(row, "sales")),
        spend: cell_as_f64(field(row, "spend")),
        clicks: cell_as_f64(field(row, "clicks")),
        impressions: cell_as_f64(field(row, "impressions")),
    })
}

/// Reads a `(platform, sales_crm, revenue_crm)` aggregate row. Unknown
/// platform names land in `other`.
pub fn crm_totals_from_row(row: &Row) -> (PlatformBucket, CrmPlatformTotals) {
    let bucket = cell_as_string(field(row, "platform"))
        .and_then(|p| p.parse().ok())
        .unwrap_or(PlatformBucket::Other);

    (
        bucket,
        CrmPlatformTotals {
            sales_crm: cell_as_f64(field(row, "sales_crm")),
            revenue_crm: cell_as_f64(field(row, "revenue_crm")),
        },
    )
}
