//! Tracked instruments and helpers for loading a watch list.

use serde::{Deserialize, Serialize};
use std::io::BufRead;

use crate::error::MonitorError;

/// One tracked market symbol together with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Provider symbol, e.g. `KZT=X` or `GC=F`.
    pub symbol: String,
    /// Human-readable label shown on metric cards.
    pub label: String,
    /// Prepended to formatted values (currency sign).
    pub prefix: String,
    /// Appended to formatted values.
    pub suffix: String,
    /// Unit the price is quoted in.
    pub unit: String,
}

impl Instrument {
    /// Creates an instrument with explicit display metadata.
    pub fn new(symbol: &str, label: &str, prefix: &str, suffix: &str, unit: &str) -> Self {
        Instrument {
            symbol: symbol.to_string(),
            label: label.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            unit: unit.to_string(),
        }
    }

    /// Instrument for a symbol outside the catalogue, labelled by the symbol itself.
    pub fn plain(symbol: &str) -> Self {
        Instrument::new(symbol, symbol, "", "", "")
    }

    /// The five instruments the monitor tracks by default.
    pub fn defaults() -> Vec<Instrument> {
        vec![
            Instrument::new("KZT=X", "USD/KZT", "₸", "", "KZT"),
            Instrument::new("RUB=X", "USD/RUB", "₽", "", "RUB"),
            Instrument::new("BZ=F", "Brent", "$", "", "USD"),
            Instrument::new("GC=F", "Gold", "$", "", "USD"),
            Instrument::new("SI=F", "Silver", "$", "", "USD"),
        ]
    }

    /// Resolves a symbol against the default catalogue (case-insensitive),
    /// falling back to a plain instrument.
    pub fn lookup(symbol: &str) -> Self {
        Instrument::defaults()
            .into_iter()
            .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
            .unwrap_or_else(|| Instrument::plain(symbol))
    }

    /// Formats a price with this instrument's prefix and suffix, two decimals.
    pub fn format_value(&self, value: f64) -> String {
        format!("{}{:.2}{}", self.prefix, value, self.suffix)
    }
}

/// Trait providing file parsing for watch lists.
pub trait InstrumentParser {
    /// Parses instruments from a buffered reader.
    ///
    /// Each non-empty line holds one symbol; `#` starts a comment. Duplicate
    /// symbols are ignored. Returns an error if a line contains whitespace
    /// inside the symbol or the file names no instruments at all.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Instrument>, MonitorError>;
}

impl InstrumentParser for Instrument {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, MonitorError> {
        let mut instruments: Vec<Instrument> = Vec::new();

        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(MonitorError::Io)?;
            let content = match line.split_once('#') {
                Some((before, _)) => before,
                None => line.as_str(),
            };
            let symbol = content.trim();
            if symbol.is_empty() {
                continue;
            }
            if symbol.split_whitespace().count() > 1 {
                return Err(MonitorError::ParseInstrumentsFile(format!(
                    "line {}: expected one symbol, got '{}'",
                    line_no + 1,
                    symbol
                )));
            }

            let instrument = Instrument::lookup(symbol);
            if !instruments.iter().any(|i| i.symbol == instrument.symbol) {
                instruments.push(instrument);
            }
        }

        if instruments.is_empty() {
            return Err(MonitorError::ParseInstrumentsFile(
                "no instruments listed".to_string(),
            ));
        }
        Ok(instruments)
    }
}
