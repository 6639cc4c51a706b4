//! Relative time windows and the range filter.
//!
//! Windows are anchored to the series' own latest date rather than the wall
//! clock, so a feed that is a few days stale still shows a full window.
use chrono::{Days, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::series::QuoteSeries;

/// Named lookback period selectable on the dashboard.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum RangeWindow {
    #[default]
    #[value(name = "1m")]
    #[strum(serialize = "1M")]
    #[serde(rename = "1M")]
    OneMonth,
    #[value(name = "3m")]
    #[strum(serialize = "3M")]
    #[serde(rename = "3M")]
    ThreeMonths,
    #[value(name = "6m")]
    #[strum(serialize = "6M")]
    #[serde(rename = "6M")]
    SixMonths,
    #[value(name = "1y")]
    #[strum(serialize = "1Y")]
    #[serde(rename = "1Y")]
    OneYear,
    #[value(name = "5y")]
    #[strum(serialize = "5Y")]
    #[serde(rename = "5Y")]
    FiveYears,
    #[value(name = "all")]
    #[strum(serialize = "ALL")]
    #[serde(rename = "ALL")]
    All,
}

impl RangeWindow {
    /// Lookback in days, or `None` for the all-time window.
    pub fn day_offset(self) -> Option<u64> {
        match self {
            RangeWindow::OneMonth => Some(30),
            RangeWindow::ThreeMonths => Some(90),
            RangeWindow::SixMonths => Some(180),
            RangeWindow::OneYear => Some(365),
            RangeWindow::FiveYears => Some(365 * 5),
            RangeWindow::All => None,
        }
    }

    /// First date inside the window for `series`; `None` for an empty series.
    pub fn cutoff(self, series: &QuoteSeries) -> Option<NaiveDate> {
        let max_date = series.max_date()?;
        match self.day_offset() {
            Some(days) => Some(
                max_date
                    .checked_sub_days(Days::new(days))
                    .unwrap_or(NaiveDate::MIN),
            ),
            None => series.min_date(),
        }
    }

    /// Observations of `series` dated on or after the cutoff, as a new series.
    pub fn apply(self, series: &QuoteSeries) -> QuoteSeries {
        match self.cutoff(series) {
            Some(cutoff) => series.since(cutoff),
            None => QuoteSeries::empty(series.symbol()),
        }
    }
}

/// Free-function form of [`RangeWindow::apply`].
pub fn filter_range(series: &QuoteSeries, window: RangeWindow) -> QuoteSeries {
    window.apply(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Observation;
    use strum::IntoEnumIterator;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(from: NaiveDate, to: NaiveDate) -> QuoteSeries {
        let observations = from
            .iter_days()
            .take_while(|d| *d <= to)
            .enumerate()
            .map(|(i, d)| Observation::close(d, 100.0 + i as f64))
            .collect();
        QuoteSeries::new("KZT=X", observations)
    }

    #[test]
    fn test_one_month_window() {
        let series = daily(date(2023, 1, 1), date(2024, 1, 1));
        let filtered = RangeWindow::OneMonth.apply(&series);
        assert_eq!(filtered.min_date(), Some(date(2023, 12, 2)));
        assert_eq!(filtered.max_date(), Some(date(2024, 1, 1)));
        assert_eq!(filtered.len(), 31);
    }

    #[test]
    fn test_all_window_keeps_everything() {
        let series = daily(date(2023, 1, 1), date(2023, 3, 1));
        assert_eq!(RangeWindow::All.apply(&series), series);
        assert_eq!(RangeWindow::All.cutoff(&series), Some(date(2023, 1, 1)));
    }

    #[test]
    fn test_window_anchored_to_series_not_clock() {
        let series = daily(date(2001, 1, 1), date(2001, 12, 31));
        let filtered = RangeWindow::ThreeMonths.apply(&series);
        assert_eq!(filtered.max_date(), Some(date(2001, 12, 31)));
        assert_eq!(filtered.min_date(), Some(date(2001, 10, 2)));
    }

    #[test]
    fn test_empty_series() {
        let empty = QuoteSeries::empty("GC=F");
        for window in RangeWindow::iter() {
            let filtered = window.apply(&empty);
            assert!(filtered.is_empty());
            assert_eq!(filtered.symbol(), "GC=F");
        }
    }

    #[test]
    fn test_idempotent_and_pure() {
        let series = daily(date(2020, 1, 1), date(2024, 6, 30));
        let before = series.clone();
        for window in RangeWindow::iter() {
            let once = filter_range(&series, window);
            let twice = filter_range(&once, window);
            assert_eq!(once, twice, "{}", window);
        }
        assert_eq!(series, before);
    }

    #[test]
    fn test_offsets_and_labels() {
        let offsets: Vec<Option<u64>> = RangeWindow::iter().map(|w| w.day_offset()).collect();
        assert_eq!(
            offsets,
            vec![Some(30), Some(90), Some(180), Some(365), Some(1825), None]
        );
        assert_eq!(RangeWindow::FiveYears.to_string(), "5Y");
        assert_eq!("all".parse::<RangeWindow>().unwrap(), RangeWindow::All);
        assert_eq!("1m".parse::<RangeWindow>().unwrap(), RangeWindow::OneMonth);
    }
}
