use crate::config::{validate_band, validate_window_size, DEFAULT_BAND, DEFAULT_MA_WINDOW};
use crate::error::Result;
use crate::schema::{ForecastPoint, RevenueFact};
use crate::utils::{get_days_in_period, validate_date_range};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Revenue of a day as observed in the raw facts.
///
/// `Absent` means no won deal closed that day. It is kept distinct from a
/// stored zero because the moving average skips absent days entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum RawRevenue {
    Present(f64),
    Absent,
}

impl RawRevenue {
    pub fn value(&self) -> Option<f64> {
        match self {
            RawRevenue::Present(v) => Some(*v),
            RawRevenue::Absent => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensifiedDay {
    pub date: NaiveDate,
    /// Raw revenue, or 0 when the day is absent.
    pub revenue_actual_filled: f64,
    pub revenue_actual_raw: RawRevenue,
}

/// Expands sparse facts into one entry per calendar day of `[start, end]`.
///
/// Facts sharing a date are summed; facts outside the range are ignored.
pub fn densify(
    facts: &[RevenueFact],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DensifiedDay>> {
    validate_date_range(start, end)?;

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for fact in facts {
        *by_date.entry(fact.date).or_insert(0.0) += fact.revenue_actual;
    }

    let days: Vec<DensifiedDay> = get_days_in_period(start, end)
        .into_iter()
        .map(|date| match by_date.get(&date) {
            Some(&amount) => DensifiedDay {
                date,
                revenue_actual_filled: amount,
                revenue_actual_raw: RawRevenue::Present(amount),
            },
            None => DensifiedDay {
                date,
                revenue_actual_filled: 0.0,
                revenue_actual_raw: RawRevenue::Absent,
            },
        })
        .collect();

    debug!(
        "Densified {} facts into {} days ({} to {})",
        facts.len(),
        days.len(),
        start,
        end
    );

    Ok(days)
}

/// Trailing moving average with a fixed symmetric band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageProjector {
    window_size: usize,
    band: f64,
}

impl Default for MovingAverageProjector {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_MA_WINDOW,
            band: DEFAULT_BAND,
        }
    }
}

impl MovingAverageProjector {
    pub fn new(window_size: usize, band: f64) -> Result<Self> {
        validate_window_size(window_size)?;
        validate_band(band)?;
        Ok(Self { window_size, band })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn band(&self) -> f64 {
        self.band
    }

    /// Projects every day in `days`, which must be ascending and gap-free.
    pub fn project(&self, days: &[DensifiedDay]) -> Vec<ForecastPoint> {
        days.iter()
            .enumerate()
            .map(|(i, day)| {
                let window_start = (i + 1).saturating_sub(self.window_size);
                let expected = trailing_mean(&days[window_start..=i]);

                ForecastPoint {
                    date: day.date,
                    revenue_actual: day.revenue_actual_filled,
                    expected,
                    pessimistic: expected * (1.0 - self.band),
                    optimistic: expected * (1.0 + self.band),
                    is_history: true,
                }
            })
            .collect()
    }
}

/// Mean of the present values in `window`; 0 when none are present.
fn trailing_mean(window: &[DensifiedDay]) -> f64 {
    let (sum, count) = window
        .iter()
        .filter_map(|d| d.revenue_actual_raw.value())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn project(days: &[DensifiedDay], window_size: usize, band: f64) -> Result<Vec<ForecastPoint>> {
    Ok(MovingAverageProjector::new(window_size, band)?.project(days))
}
