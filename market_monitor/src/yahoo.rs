//! Yahoo Finance quote source.
//!
//! Each requested symbol is downloaded from the v8 chart endpoint on its own
//! worker thread (see [`fan_out`]). Workers report back over a `crossbeam_channel`; results are
//! collected into a map keyed by symbol so the merged table does not depend on
//! which download finished first. A symbol that fails is logged and left out;
//! the fetch only fails when every symbol does.
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use crossbeam_channel::unbounded;
use log::{debug, info, warn};
use market_common::table::{ColumnKey, RawQuoteTable, RawTimestamp};
use market_common::{HistorySpan, Instrument, MonitorError, QuoteSource, Result};
use reqwest::blocking::Client;
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use crate::model::chart::{ChartResponse, HistoryRow};

const PROVIDER: &str = "YAHOO";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Fields written per symbol, in column order.
const FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Blocking Yahoo Finance chart client.
pub struct YahooSource {
    client: Client,
}

impl YahooSource {
    /// Builds the HTTP client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MonitorError::provider(PROVIDER, format!("failed to build client: {e}")))?;
        Ok(YahooSource { client })
    }

    fn range_param(span: HistorySpan) -> &'static str {
        match span {
            HistorySpan::OneYear => "1y",
            HistorySpan::TwoYears => "2y",
            HistorySpan::Max => "max",
        }
    }

    /// Downloads and parses the daily chart of one symbol.
    fn fetch_symbol(client: &Client, symbol: &str, span: HistorySpan) -> Result<Vec<HistoryRow>> {
        let url = format!("{}/{}", CHART_URL, symbol);
        let response = client
            .get(&url)
            .query(&[
                ("range", Self::range_param(span)),
                ("interval", "1d"),
                ("includePrePost", "false"),
            ])
            .send()
            .map_err(|e| MonitorError::provider(PROVIDER, format!("{symbol}: request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::provider(
                PROVIDER,
                format!("{symbol}: HTTP {status}"),
            ));
        }

        let body: ChartResponse = response
            .json()
            .map_err(|e| MonitorError::provider(PROVIDER, format!("{symbol}: parse failed: {e}")))?;
        if let Some(error) = body.chart.error {
            return Err(MonitorError::provider(
                PROVIDER,
                format!("{symbol}: {} ({})", error.description, error.code),
            ));
        }

        let result = body
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MonitorError::provider(PROVIDER, format!("{symbol}: empty result")))?;
        debug!(
            "{}: {} timestamp(s), currency {:?}",
            result.meta.symbol,
            result.timestamp.len(),
            result.meta.currency
        );
        Ok(result.into_rows())
    }
}

impl QuoteSource for YahooSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch(&self, instruments: &[Instrument], span: HistorySpan) -> Result<RawQuoteTable> {
        let symbols: Vec<String> = instruments.iter().map(|i| i.symbol.clone()).collect();
        let client = self.client.clone();
        let histories = fan_out(&symbols, move |symbol| {
            YahooSource::fetch_symbol(&client, symbol, span)
        })?;

        let table = merge_histories(&histories);
        info!(
            "Fetched {} symbol(s), {} row(s); {} failed",
            histories.len(),
            table.row_count(),
            symbols.len() - histories.len()
        );
        Ok(table)
    }
}

/// Runs `fetch_one` for every symbol on its own thread and collects the results
/// by symbol. A failing symbol is logged and left out; the call fails only when
/// every symbol does.
pub fn fan_out<F>(symbols: &[String], fetch_one: F) -> Result<BTreeMap<String, Vec<HistoryRow>>>
where
    F: Fn(&str) -> Result<Vec<HistoryRow>> + Send + Clone + 'static,
{
    let (tx, rx) = unbounded::<(String, Result<Vec<HistoryRow>>)>();

    for symbol in symbols {
        let tx = tx.clone();
        let fetch_one = fetch_one.clone();
        let symbol = symbol.clone();
        thread::spawn(move || {
            let result = fetch_one(&symbol);
            // the receiver only disappears if fan_out() already returned
            let _ = tx.send((symbol, result));
        });
    }
    drop(tx);

    let mut histories: BTreeMap<String, Vec<HistoryRow>> = BTreeMap::new();
    let mut failures = Vec::new();
    for _ in symbols {
        let (symbol, result) = rx
            .recv()
            .map_err(|e| MonitorError::ChannelRecv(e.to_string()))?;
        match result {
            Ok(rows) => {
                debug!("{}: {} row(s)", symbol, rows.len());
                histories.insert(symbol, rows);
            }
            Err(e) => {
                warn!("Skipping {}: {}", symbol, e);
                failures.push(symbol);
            }
        }
    }

    if histories.is_empty() && !symbols.is_empty() {
        return Err(MonitorError::provider(
            PROVIDER,
            format!("all {} symbol(s) failed", failures.len()),
        ));
    }
    Ok(histories)
}

/// Merges per-symbol histories into one instrument-major table.
///
/// Rows are aligned on the exchange-local calendar date; for a date reported
/// twice by the same symbol the later row wins. Each index entry keeps the
/// first exchange timestamp seen for its date.
pub fn merge_histories(histories: &BTreeMap<String, Vec<HistoryRow>>) -> RawQuoteTable {
    let mut stamps: BTreeMap<NaiveDate, DateTime<FixedOffset>> = BTreeMap::new();
    let mut by_date: BTreeMap<&str, BTreeMap<NaiveDate, &HistoryRow>> = BTreeMap::new();

    for (symbol, rows) in histories {
        let rows_by_date = by_date.entry(symbol.as_str()).or_default();
        for row in rows {
            let date = row.stamp.date_naive();
            stamps.entry(date).or_insert(row.stamp);
            rows_by_date.insert(date, row);
        }
    }

    let mut table = RawQuoteTable::new(
        stamps
            .values()
            .map(|stamp| RawTimestamp::Text(stamp.to_rfc3339_opts(SecondsFormat::Secs, false)))
            .collect(),
    );

    for (symbol, rows) in &by_date {
        for field in FIELDS {
            let values = stamps
                .keys()
                .map(|date| {
                    rows.get(date).and_then(|row| match field {
                        "Open" => row.open,
                        "High" => row.high,
                        "Low" => row.low,
                        "Close" => row.close,
                        _ => row.volume,
                    })
                })
                .collect();
            table.push_column(ColumnKey::pair(symbol, field), values);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_common::normalize;

    fn row(stamp: &str, close: f64) -> HistoryRow {
        HistoryRow {
            stamp: DateTime::parse_from_rfc3339(stamp).unwrap(),
            open: Some(close - 1.0),
            high: Some(close + 1.0),
            low: Some(close - 2.0),
            close: Some(close),
            volume: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_merge_aligns_on_local_date() {
        let mut histories = BTreeMap::new();
        histories.insert(
            "KZT=X".to_string(),
            vec![
                row("2024-06-05T00:00:00+01:00", 447.0),
                row("2024-06-06T00:00:00+01:00", 448.0),
            ],
        );
        histories.insert(
            "GC=F".to_string(),
            vec![
                row("2024-06-05T00:00:00-04:00", 2370.0),
                // live row for the same day replaces the earlier one
                row("2024-06-05T13:45:10-04:00", 2375.0),
            ],
        );

        let table = merge_histories(&histories);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns.len(), 10);
        assert_eq!(table.columns[0].key, ColumnKey::pair("GC=F", "Open"));

        let expected = vec![Instrument::lookup("KZT=X"), Instrument::lookup("GC=F")];
        let out = normalize(&table, &expected);
        assert_eq!(out.get("KZT=X").unwrap().closes(), vec![447.0, 448.0]);
        let gold = out.get("GC=F").unwrap();
        assert_eq!(gold.closes(), vec![2375.0]);
        assert_eq!(gold.max_date(), Some(date(2024, 6, 5)));
        assert!(gold.has_ohlc());
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fake_fetch(symbol: &str) -> Result<Vec<HistoryRow>> {
        match symbol {
            "GC=F" => Ok(vec![
                row("2024-06-04T00:00:00-04:00", 2360.0),
                row("2024-06-05T00:00:00-04:00", 2370.0),
            ]),
            "KZT=X" => Ok(vec![row("2024-06-05T00:00:00+01:00", 447.0)]),
            other => Err(MonitorError::provider(PROVIDER, format!("{other}: HTTP 404 Not Found"))),
        }
    }

    #[test]
    fn test_fan_out_skips_failed_symbol() {
        let histories = fan_out(&symbols(&["GC=F", "SI=F", "KZT=X"]), fake_fetch).unwrap();
        assert_eq!(
            histories.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["GC=F", "KZT=X"]
        );

        let table = merge_histories(&histories);
        let expected = vec![
            Instrument::lookup("GC=F"),
            Instrument::lookup("SI=F"),
            Instrument::lookup("KZT=X"),
        ];
        let out = normalize(&table, &expected);
        assert_eq!(out.get("GC=F").unwrap().closes(), vec![2360.0, 2370.0]);
        assert_eq!(out.get("KZT=X").unwrap().closes(), vec![447.0]);
        assert!(out.get("SI=F").is_none());
    }

    #[test]
    fn test_fan_out_fails_when_every_symbol_fails() {
        let result = fan_out(&symbols(&["SI=F", "BZ=F"]), fake_fetch);
        match result {
            Err(MonitorError::Provider { provider, message }) => {
                assert_eq!(provider, "YAHOO");
                assert_eq!(message, "all 2 symbol(s) failed");
            }
            other => panic!("expected provider error, got {:?}", other.map(|h| h.len())),
        }
    }

    #[test]
    fn test_fan_out_no_symbols() {
        assert!(fan_out(&[], fake_fetch).unwrap().is_empty());
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_histories(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_range_param() {
        assert_eq!(YahooSource::range_param(HistorySpan::Max), "max");
        assert_eq!(YahooSource::range_param(HistorySpan::TwoYears), "2y");
    }
}
