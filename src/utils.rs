use crate::error::{ForecastError, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(ForecastError::InvalidDateRange { start, end });
    }
    Ok(())
}

/// Every calendar day in `[start, end]`, ascending. Empty when `start > end`.
pub fn get_days_in_period(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// First day of the trailing window of `window_size` days that ends on `end`.
pub fn trailing_window_start(end: NaiveDate, window_size: usize) -> NaiveDate {
    let back = window_size.saturating_sub(1) as u64;
    end.checked_sub_days(Days::new(back))
        .unwrap_or(NaiveDate::MIN)
}

pub fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN)
    } else {
        date.checked_add_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Parses a calendar date as the warehouse or a browser may send it.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `DD/MM/YYYY`. Anything after the
/// first ten characters (a time component, a timezone) is ignored.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(head, format) {
            return Ok(date);
        }
    }

    Err(ForecastError::DateError(format!(
        "Invalid date '{}'. Expected YYYY-MM-DD",
        raw
    )))
}

pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_calendar_date(value).map(Some),
    }
}

/// Quick-pick ranges offered by the dashboard filter bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodPreset {
    Today,
    Month,
    Quarter,
    Year,
}

impl PeriodPreset {
    /// Resolves the preset to `(start, end)`, always ending on `today`.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self {
            PeriodPreset::Today => today,
            PeriodPreset::Month => today.with_day(1).unwrap_or(today),
            PeriodPreset::Quarter => {
                let quarter_start_month = (today.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(today.year(), quarter_start_month, 1).unwrap_or(today)
            }
            PeriodPreset::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        (start, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_period_crosses_leap_day() {
        let days = get_days_in_period(date(2024, 2, 27), date(2024, 3, 1));
        assert_eq!(
            days,
            vec![
                date(2024, 2, 27),
                date(2024, 2, 28),
                date(2024, 2, 29),
                date(2024, 3, 1)
            ]
        );
        assert_eq!(days_between(date(2024, 2, 27), date(2024, 3, 1)), 3);
        assert!(get_days_in_period(date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_trailing_window_start() {
        assert_eq!(trailing_window_start(date(2024, 1, 14), 14), date(2024, 1, 1));
        assert_eq!(trailing_window_start(date(2024, 1, 14), 1), date(2024, 1, 14));
        assert_eq!(trailing_window_start(date(2024, 1, 14), 0), date(2024, 1, 14));
    }

    #[test]
    fn test_parse_calendar_date_formats() {
        assert_eq!(parse_calendar_date("2024-03-05").unwrap(), date(2024, 3, 5));
        assert_eq!(parse_calendar_date("2024/03/05").unwrap(), date(2024, 3, 5));
        assert_eq!(parse_calendar_date("05/03/2024").unwrap(), date(2024, 3, 5));
        assert_eq!(
            parse_calendar_date("2024-03-05T18:22:10.000Z").unwrap(),
            date(2024, 3, 5)
        );
        assert!(parse_calendar_date("yesterday").is_err());
        assert_eq!(parse_optional_date(Some("  ")).unwrap(), None);
    }

    #[test]
    fn test_validate_date_range() {
        assert!(validate_date_range(date(2024, 1, 1), date(2024, 1, 1)).is_ok());
        let err = validate_date_range(date(2024, 1, 2), date(2024, 1, 1)).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_period_presets() {
        let today = date(2024, 8, 17);
        assert_eq!(PeriodPreset::Today.range(today), (today, today));
        assert_eq!(PeriodPreset::Month.range(today).0, date(2024, 8, 1));
        assert_eq!(PeriodPreset::Quarter.range(today).0, date(2024, 7, 1));
        assert_eq!(PeriodPreset::Year.range(today).0, date(2024, 1, 1));
        assert_eq!(PeriodPreset::Quarter.range(date(2024, 3, 31)).0, date(2024, 1, 1));
    }
}
