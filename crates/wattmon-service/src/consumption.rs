//! Consumption aggregates over daily energy records.
//!
//! The cumulative `kwh` counter is the source of truth: a day's consumption
//! is the span between its first and last valid readings, an
//! under-the-curve measurement that tolerates the counter starting mid-day
//! or dropping out before midnight.

use time::{Date, Duration};
use wattmon_types::{EnergyDay, KWH_FIELD};

/// Daily consumption in kWh: last valid `kwh` reading minus the first.
///
/// The first record is not guaranteed to carry a valid value, so both
/// endpoints are searched; a reading counts as valid when it is present and
/// nonzero. A day with no valid readings yields 0.
pub fn daily_consumption(day: &EnergyDay) -> f64 {
    let mut valid = day
        .records
        .iter()
        .filter_map(|r| r.get(KWH_FIELD))
        .filter(|kwh| *kwh != 0.0);

    let Some(first) = valid.next() else {
        return 0.0;
    };
    let last = valid.last().unwrap_or(first);

    last - first
}

/// Sum a month of daily consumptions, estimating across missing days.
///
/// A day with 0.0 consumption counts as missing. When some days are
/// missing, the total is extrapolated from the mean of the non-empty days;
/// when every day is missing, the total is 0.
pub fn month_total(consumptions: &[f64]) -> (f64, usize) {
    let empty = consumptions.iter().filter(|c| **c == 0.0).count();
    let non_empty = consumptions.len() - empty;

    let total = if empty == 0 {
        consumptions.iter().sum()
    } else if non_empty == 0 {
        0.0
    } else {
        (consumptions.iter().sum::<f64>() / non_empty as f64) * consumptions.len() as f64
    };

    (total, empty)
}

/// Shrink a consumption window from both ends while the edge days are
/// empty, keeping at least a 4-day span. Returns the inclusive
/// `(start, end)` indexes, or `None` when not enough data remains for a
/// meaningful average.
pub fn trim_empty_window(consumptions: &[f64]) -> Option<(usize, usize)> {
    if consumptions.len() <= 4 {
        return None;
    }

    let mut start = 0;
    let mut end = consumptions.len() - 1;

    while consumptions[end] == 0.0 && end - start > 3 {
        end -= 1;
    }
    while consumptions[start] == 0.0 && end - start > 3 {
        start += 1;
    }

    if end - start <= 3 {
        None
    } else {
        Some((start, end))
    }
}

/// Every day of the calendar month before the one containing `today`.
pub fn last_month_days(today: Date) -> Vec<Date> {
    let Some(end) = today.replace_day(1).ok().and_then(|d| d.previous_day()) else {
        return Vec::new();
    };
    let Ok(start) = end.replace_day(1) else {
        return Vec::new();
    };

    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

/// The last 30 days up to and including `today`, oldest first.
pub fn last_30_days(today: Date) -> Vec<Date> {
    (0..30)
        .rev()
        .filter_map(|i| today.checked_sub(Duration::days(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use wattmon_types::SensorRecord;

    fn day_with_kwh(values: &[Option<f64>]) -> EnergyDay {
        let records = values
            .iter()
            .map(|v| {
                let mut r = SensorRecord::new();
                r.set("kwh", *v);
                r
            })
            .collect();
        EnergyDay {
            date: date!(2024 - 03 - 01),
            records,
        }
    }

    #[test]
    fn test_daily_consumption_first_and_last_valid() {
        // Leading nulls and zeros are skipped in both directions.
        let day = day_with_kwh(&[
            None,
            Some(0.0),
            Some(104.2),
            Some(104.9),
            Some(106.0),
            None,
            Some(0.0),
        ]);
        assert!((daily_consumption(&day) - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_daily_consumption_single_valid_reading() {
        let day = day_with_kwh(&[None, Some(104.2), None]);
        assert_eq!(daily_consumption(&day), 0.0);
    }

    #[test]
    fn test_daily_consumption_no_valid_readings() {
        let day = day_with_kwh(&[None, Some(0.0)]);
        assert_eq!(daily_consumption(&day), 0.0);

        let empty = EnergyDay::empty(date!(2024 - 03 - 01));
        assert_eq!(daily_consumption(&empty), 0.0);
    }

    #[test]
    fn test_month_total_complete() {
        let (total, empty) = month_total(&[1.0, 2.0, 3.0]);
        assert_eq!(total, 6.0);
        assert_eq!(empty, 0);
    }

    #[test]
    fn test_month_total_estimates_missing_days() {
        // Mean of non-empty days (2.0) extrapolated over 4 days.
        let (total, empty) = month_total(&[1.0, 0.0, 3.0, 0.0]);
        assert_eq!(total, 8.0);
        assert_eq!(empty, 2);
    }

    #[test]
    fn test_month_total_all_missing() {
        let (total, empty) = month_total(&[0.0, 0.0]);
        assert_eq!(total, 0.0);
        assert_eq!(empty, 2);
    }

    #[test]
    fn test_trim_empty_window_no_gaps() {
        let consumptions = vec![1.0; 30];
        assert_eq!(trim_empty_window(&consumptions), Some((0, 29)));
    }

    #[test]
    fn test_trim_empty_window_shrinks_edges() {
        let mut consumptions = vec![1.0; 30];
        consumptions[0] = 0.0;
        consumptions[1] = 0.0;
        consumptions[29] = 0.0;
        // A zero inside the window does not shrink it.
        consumptions[15] = 0.0;

        assert_eq!(trim_empty_window(&consumptions), Some((2, 28)));
    }

    #[test]
    fn test_trim_empty_window_too_sparse() {
        // Only 3 usable days survive at the head.
        let mut consumptions = vec![0.0; 30];
        consumptions[0] = 1.0;
        consumptions[1] = 1.0;
        consumptions[2] = 1.0;

        assert_eq!(trim_empty_window(&consumptions), None);
        assert_eq!(trim_empty_window(&[1.0, 1.0]), None);
    }

    #[test]
    fn test_last_month_days() {
        let days = last_month_days(date!(2024 - 03 - 15));
        assert_eq!(days.len(), 29); // February 2024 was a leap month
        assert_eq!(days[0], date!(2024 - 02 - 01));
        assert_eq!(days[28], date!(2024 - 02 - 29));

        let days = last_month_days(date!(2024 - 01 - 01));
        assert_eq!(days.len(), 31);
        assert_eq!(days[0], date!(2023 - 12 - 01));
    }

    #[test]
    fn test_last_30_days() {
        let days = last_30_days(date!(2024 - 03 - 15));
        assert_eq!(days.len(), 30);
        assert_eq!(days[0], date!(2024 - 02 - 15));
        assert_eq!(days[29], date!(2024 - 03 - 15));
    }
}
