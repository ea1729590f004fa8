use crate::schema::ForecastPoint;
use crate::utils::trailing_window_start;
use chrono::NaiveDate;
use log::debug;

/// Backward-looking accuracy of the expected values over the last
/// `window_size` days ending on `end_date`.
///
/// Computed as `1 - mean(|actual - expected| / expected)` and clamped to
/// `[0, 1]`. Days whose expected value is 0 contribute no term; when no day
/// contributes, the rate is 0.
pub fn score(series: &[ForecastPoint], window_size: usize, end_date: NaiveDate) -> f64 {
    let tail_start = trailing_window_start(end_date, window_size);

    let errors: Vec<f64> = series
        .iter()
        .filter(|p| p.date >= tail_start && p.date <= end_date)
        .filter(|p| p.expected != 0.0)
        .map(|p| (p.revenue_actual - p.expected).abs() / p.expected)
        .collect();

    if errors.is_empty() {
        debug!("No scorable days between {} and {}", tail_start, end_date);
        return 0.0;
    }

    let mape = errors.iter().sum::<f64>() / errors.len() as f64;
    let accuracy = 1.0 - mape;

    if accuracy.is_nan() {
        0.0
    } else {
        accuracy.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(d: u32, revenue_actual: f64, expected: f64) -> ForecastPoint {
        ForecastPoint {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            revenue_actual,
            expected,
            pessimistic: expected * 0.8,
            optimistic: expected * 1.2,
            is_history: true,
        }
    }

    fn end(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_perfect_expectation() {
        let series = vec![point(1, 100.0, 100.0), point(2, 50.0, 50.0)];
        assert_eq!(score(&series, 14, end(2)), 1.0);
    }

    #[test]
    fn test_mean_relative_error() {
        // errors: 0.1 and 0.3 -> mean 0.2
        let series = vec![point(1, 110.0, 100.0), point(2, 70.0, 100.0)];
        assert!((score(&series, 2, end(2)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_only_tail_is_scored() {
        let series = vec![
            point(1, 0.0, 100.0),
            point(2, 100.0, 100.0),
            point(3, 100.0, 100.0),
        ];
        assert_eq!(score(&series, 2, end(3)), 1.0);
        assert!((score(&series, 3, end(3)) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_expected_days_are_skipped() {
        let series = vec![point(1, 500.0, 0.0), point(2, 90.0, 100.0)];
        assert!((score(&series, 2, end(2)) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_tails() {
        assert_eq!(score(&[], 14, end(10)), 0.0);

        let all_zero = vec![point(1, 0.0, 0.0), point(2, 0.0, 0.0)];
        assert_eq!(score(&all_zero, 14, end(2)), 0.0);
    }

    #[test]
    fn test_clamped_to_unit_interval() {
        let series = vec![point(1, 1_000.0, 10.0)];
        assert_eq!(score(&series, 1, end(1)), 0.0);

        let wild = vec![point(1, 1e12, 1e-6), point(2, 0.0, 3.0), point(3, 3.0, 3.0)];
        let rate = score(&wild, 3, end(3));
        assert!((0.0..=1.0).contains(&rate));
    }
}
