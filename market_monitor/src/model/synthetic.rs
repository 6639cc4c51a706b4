//! Offline price generator.
//!
//! `SyntheticSource` produces daily OHLC rows for every requested instrument
//! with a small random walk, skipping weekends so candlestick output has real
//! gaps to compress. The walk is seeded, so the same seed and end date always
//! give the same table. Rows come out in field-major layout, the shape a
//! multi-ticker download usually has.
use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use log::debug;
use market_common::table::{ColumnKey, RawQuoteTable, RawTimestamp};
use market_common::{HistorySpan, Instrument, QuoteSource, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Days generated for `HistorySpan::Max`.
const MAX_HISTORY_DAYS: u64 = 3650;

/// Random-walk table generator.
pub struct SyntheticSource {
    seed: u64,
    end: NaiveDate,
}

impl SyntheticSource {
    /// Generator whose series end today (UTC).
    pub fn new(seed: u64) -> Self {
        Self::ending_on(seed, Utc::now().date_naive())
    }

    /// Generator whose series end on `end`.
    pub fn ending_on(seed: u64, end: NaiveDate) -> Self {
        SyntheticSource { seed, end }
    }

    /// Next price: a uniform step in `[-1%, +1%]` around `current_price`, kept positive.
    fn next_price(rng: &mut StdRng, current_price: f64) -> f64 {
        let change: f64 = rng.random_range(-0.01..0.01);
        let new_price = current_price * (1.0 + change);
        new_price.max(0.01)
    }

    /// Rough starting level so generated values look like the real instrument.
    fn initial_price(symbol: &str) -> f64 {
        match symbol {
            "KZT=X" => 450.0,
            "RUB=X" => 90.0,
            "BZ=F" => 80.0,
            "GC=F" => 2000.0,
            "SI=F" => 24.0,
            _ => 100.0,
        }
    }

    fn trading_days(&self, span: HistorySpan) -> Vec<NaiveDate> {
        let days = span.lookback_days().unwrap_or(MAX_HISTORY_DAYS);
        let start = self.end.checked_sub_days(Days::new(days)).unwrap_or(self.end);
        start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .collect()
    }
}

impl QuoteSource for SyntheticSource {
    fn name(&self) -> &str {
        "SYNTHETIC"
    }

    fn fetch(&self, instruments: &[Instrument], span: HistorySpan) -> Result<RawQuoteTable> {
        let days = self.trading_days(span);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut table = RawQuoteTable::new(days.iter().map(|d| RawTimestamp::from(*d)).collect());

        let mut fields: [Vec<(String, Vec<Option<f64>>)>; 4] = Default::default();
        for instrument in instruments {
            let mut price = Self::initial_price(&instrument.symbol);
            let mut columns: [Vec<Option<f64>>; 4] = Default::default();

            for _ in &days {
                let open = price;
                let close = Self::next_price(&mut rng, open);
                let wick: f64 = rng.random_range(0.0..0.005);
                columns[0].push(Some(open));
                columns[1].push(Some(open.max(close) * (1.0 + wick)));
                columns[2].push(Some(open.min(close) * (1.0 - wick)));
                columns[3].push(Some(close));
                price = close;
            }

            for (slot, values) in fields.iter_mut().zip(columns) {
                slot.push((instrument.symbol.clone(), values));
            }
        }

        for (field, columns) in ["Open", "High", "Low", "Close"].iter().zip(fields) {
            for (symbol, values) in columns {
                table.push_column(ColumnKey::pair(field, &symbol), values);
            }
        }

        debug!(
            "Generated {} day(s) for {} instrument(s)",
            days.len(),
            instruments.len()
        );
        Ok(table)
    }
}
