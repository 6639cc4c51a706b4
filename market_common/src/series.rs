//! Normalized per-instrument price series.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::gaps;

/// One dated price record. Close-only observations carry no open/high/low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price, when the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    /// Session high, when the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    /// Session low, when the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    /// Closing price.
    pub close: f64,
}

impl Observation {
    /// Close-only observation.
    pub fn close(date: NaiveDate, close: f64) -> Self {
        Observation {
            date,
            open: None,
            high: None,
            low: None,
            close,
        }
    }

    /// Full OHLC observation.
    pub fn ohlc(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Observation {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
        }
    }

    /// `true` when open, high and low are all present.
    pub fn is_candle(&self) -> bool {
        self.open.is_some() && self.high.is_some() && self.low.is_some()
    }

    /// `true` when every present price is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [Some(self.close), self.open, self.high, self.low]
            .into_iter()
            .flatten()
            .all(|v| v.is_finite() && v >= 0.0)
    }
}

/// Date-ordered observations for a single instrument.
///
/// Dates are strictly increasing. Construction sorts the input and, for a date
/// that appears more than once, keeps the observation that came last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRecord")]
pub struct QuoteSeries {
    symbol: String,
    observations: Vec<Observation>,
}

/// Wire shape of a series; converted through `QuoteSeries::new`.
#[derive(Deserialize)]
struct SeriesRecord {
    symbol: String,
    observations: Vec<Observation>,
}

impl TryFrom<SeriesRecord> for QuoteSeries {
    type Error = MonitorError;

    fn try_from(record: SeriesRecord) -> Result<Self, Self::Error> {
        if let Some(bad) = record.observations.iter().find(|o| !o.is_valid()) {
            return Err(MonitorError::InvalidSeries(format!(
                "{}: negative or non-finite price on {}",
                record.symbol, bad.date
            )));
        }
        Ok(QuoteSeries::new(&record.symbol, record.observations))
    }
}

impl QuoteSeries {
    /// Builds a series, enforcing date order and uniqueness.
    pub fn new(symbol: &str, mut observations: Vec<Observation>) -> Self {
        // stable sort keeps arrival order within a date
        observations.sort_by_key(|o| o.date);
        let mut unique: Vec<Observation> = Vec::with_capacity(observations.len());
        for observation in observations {
            match unique.last_mut() {
                Some(last) if last.date == observation.date => *last = observation,
                _ => unique.push(observation),
            }
        }
        QuoteSeries {
            symbol: symbol.to_string(),
            observations: unique,
        }
    }

    /// Series with no observations.
    pub fn empty(symbol: &str) -> Self {
        QuoteSeries {
            symbol: symbol.to_string(),
            observations: Vec::new(),
        }
    }

    /// Instrument symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Observations in ascending date order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// `true` when there are no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Earliest date.
    pub fn min_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    /// Latest date.
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Last observation.
    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.close).collect()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.observations.iter().map(|o| o.date)
    }

    /// `true` when every observation carries a full candle.
    pub fn has_ohlc(&self) -> bool {
        !self.observations.is_empty() && self.observations.iter().all(Observation::is_candle)
    }

    /// Observations dated on or after `cutoff`, as a new series.
    pub fn since(&self, cutoff: NaiveDate) -> QuoteSeries {
        let start = self.observations.partition_point(|o| o.date < cutoff);
        QuoteSeries {
            symbol: self.symbol.clone(),
            observations: self.observations[start..].to_vec(),
        }
    }

    /// Calendar dates between the first and last observation that have no observation.
    pub fn calendar_gaps(&self) -> Vec<NaiveDate> {
        gaps::calendar_gaps(self.dates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_sorts_and_dedups_keeping_last() {
        let series = QuoteSeries::new(
            "GC=F",
            vec![
                Observation::close(date(2024, 1, 3), 3.0),
                Observation::close(date(2024, 1, 1), 1.0),
                Observation::close(date(2024, 1, 3), 4.0),
            ],
        );
        assert_eq!(series.closes(), vec![1.0, 4.0]);
        assert_eq!(series.min_date(), Some(date(2024, 1, 1)));
        assert_eq!(series.max_date(), Some(date(2024, 1, 3)));
    }

    #[test]
    fn test_new_is_idempotent() {
        let once = QuoteSeries::new(
            "GC=F",
            vec![
                Observation::close(date(2024, 1, 2), 2.0),
                Observation::close(date(2024, 1, 1), 1.0),
            ],
        );
        let twice = QuoteSeries::new("GC=F", once.observations().to_vec());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_since_is_inclusive() {
        let series = QuoteSeries::new(
            "SI=F",
            (1..=5)
                .map(|d| Observation::close(date(2024, 1, d), d as f64))
                .collect(),
        );
        let tail = series.since(date(2024, 1, 3));
        assert_eq!(tail.closes(), vec![3.0, 4.0, 5.0]);
        assert_eq!(tail.symbol(), "SI=F");
    }

    #[test]
    fn test_close_only_serializes_without_ohlc_keys() {
        let json = serde_json::to_value(Observation::close(date(2024, 1, 1), 100.0)).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("close"));
        assert!(!object.contains_key("open"));
        assert!(!object.contains_key("high"));
        assert!(!object.contains_key("low"));
    }

    #[test]
    fn test_deserialize_restores_order() {
        let json = r#"{
            "symbol": "GC=F",
            "observations": [
                {"date": "2024-03-01", "close": 3.0},
                {"date": "2020-01-01", "close": 1.0},
                {"date": "2024-03-01", "close": 5.0}
            ]
        }"#;
        let series: QuoteSeries = serde_json::from_str(json).unwrap();
        let dates: Vec<NaiveDate> = series.dates().collect();
        assert_eq!(dates, vec![date(2020, 1, 1), date(2024, 3, 1)]);
        assert_eq!(series.closes(), vec![1.0, 5.0]);
        assert_eq!(series.min_date(), Some(date(2020, 1, 1)));
    }

    #[test]
    fn test_deserialize_rejects_negative_price() {
        let json = r#"{
            "symbol": "GC=F",
            "observations": [
                {"date": "2024-03-01", "close": 3.0},
                {"date": "2020-01-01", "close": -1.0}
            ]
        }"#;
        let err = serde_json::from_str::<QuoteSeries>(json).unwrap_err();
        assert!(err.to_string().contains("negative or non-finite price on 2020-01-01"));

        let json = r#"{"symbol": "GC=F", "observations": [{"date": "2024-03-01", "low": -2.0, "close": 3.0}]}"#;
        assert!(serde_json::from_str::<QuoteSeries>(json).is_err());
    }

    #[test]
    fn test_has_ohlc() {
        let candles = QuoteSeries::new(
            "BZ=F",
            vec![Observation::ohlc(date(2024, 1, 1), 1.0, 2.0, 0.5, 1.5)],
        );
        assert!(candles.has_ohlc());
        assert!(!QuoteSeries::empty("BZ=F").has_ohlc());
    }
}
