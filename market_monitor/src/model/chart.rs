//! Yahoo Finance chart API response models.
//!
//! The v8 chart endpoint returns parallel arrays: one `timestamp` list and one
//! list per price field, any element of which may be `null`.
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;

/// Top-level response wrapper.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

/// Result list or error, never both in practice.
#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub struct ChartMeta {
    pub symbol: String,
    pub currency: Option<String>,
    // seconds east of UTC for the exchange
    #[serde(default)]
    pub gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteIndicator {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

/// One trading day as reported by the chart endpoint, in exchange time.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub stamp: DateTime<FixedOffset>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl ChartResult {
    /// Zips the parallel arrays into rows. Timestamps outside chrono's range are skipped.
    pub fn into_rows(self) -> Vec<HistoryRow> {
        let offset = FixedOffset::east_opt(self.meta.gmtoffset).unwrap_or_else(|| Utc.fix());
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let stamp = DateTime::from_timestamp(*ts, 0)?.with_timezone(&offset);
                Some(HistoryRow {
                    stamp,
                    open: at(&quote.open, i),
                    high: at(&quote.high, i),
                    low: at(&quote.low, i),
                    close: at(&quote.close, i),
                    volume: at(&quote.volume, i),
                })
            })
            .collect()
    }
}
