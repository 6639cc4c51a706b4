//! Raw provider tables, as handed over by a quote source before normalization.
//!
//! A `RawQuoteTable` is a date index plus a list of numeric columns. Column keys
//! are either flat (`"Close"`) or two-level (`("Close", "GC=F")` in field-major
//! layout, `("GC=F", "Close")` in instrument-major layout). The table does not
//! record which layout it uses; that is detected during normalization.
//!
//! Tables serialize to JSON so they can be saved and replayed through the file
//! source:
//!
//! ```json
//! {
//!   "index": ["2024-01-01", 1704153600],
//!   "columns": [
//!     { "key": ["Close", "GC=F"], "values": [2063.7, null] }
//!   ]
//! }
//! ```
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::result::Result;

/// A timestamp exactly as the provider delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Seconds since the Unix epoch (UTC).
    Epoch(i64),
    /// Textual timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS[+HH:MM]` or `YYYY-MM-DD`.
    Text(String),
}

impl RawTimestamp {
    /// Calendar date of this timestamp in its own offset; time of day and zone are dropped.
    ///
    /// Returns `None` for text that matches none of the supported formats.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            RawTimestamp::Epoch(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.date_naive()),
            RawTimestamp::Text(text) => parse_date_text(text.trim()),
        }
    }
}

impl From<NaiveDate> for RawTimestamp {
    fn from(date: NaiveDate) -> Self {
        RawTimestamp::Text(date.format("%Y-%m-%d").to_string())
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Column key of a raw table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnKey {
    /// Single-level column name.
    Flat(String),
    /// Two-level column name `(outer, inner)`.
    Pair(String, String),
}

impl ColumnKey {
    /// Two-level key.
    pub fn pair(outer: &str, inner: &str) -> Self {
        ColumnKey::Pair(outer.to_string(), inner.to_string())
    }

    /// Single-level key.
    pub fn flat(name: &str) -> Self {
        ColumnKey::Flat(name.to_string())
    }
}

/// One numeric column, aligned with the table index. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    /// Column key.
    pub key: ColumnKey,
    /// One value per index row.
    pub values: Vec<Option<f64>>,
}

/// Shape of the column axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    /// Every column key is single-level.
    Flat,
    /// Every column key is two-level.
    TwoLevel,
}

/// Date-indexed table with flat or two-level columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuoteTable {
    /// Row timestamps.
    pub index: Vec<RawTimestamp>,
    /// Numeric columns; each has exactly `index.len()` values.
    pub columns: Vec<RawColumn>,
}

impl RawQuoteTable {
    /// Table with the given index and no columns yet.
    pub fn new(index: Vec<RawTimestamp>) -> Self {
        RawQuoteTable {
            index,
            columns: Vec::new(),
        }
    }

    /// The table a failed fetch degrades to.
    pub fn empty() -> Self {
        RawQuoteTable::default()
    }

    /// Appends a column.
    pub fn push_column(&mut self, key: ColumnKey, values: Vec<Option<f64>>) {
        self.columns.push(RawColumn { key, values });
    }

    /// `true` when there are no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// Number of index rows.
    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    /// Checks column lengths and key-level consistency, returning the layout.
    pub fn validate(&self) -> Result<ColumnLayout> {
        for column in &self.columns {
            if column.values.len() != self.index.len() {
                return Err(MonitorError::MalformedTable(format!(
                    "column {:?} has {} values for {} index rows",
                    column.key,
                    column.values.len(),
                    self.index.len()
                )));
            }
        }

        let pairs = self
            .columns
            .iter()
            .filter(|c| matches!(c.key, ColumnKey::Pair(..)))
            .count();
        match pairs {
            0 => Ok(ColumnLayout::Flat),
            n if n == self.columns.len() => Ok(ColumnLayout::TwoLevel),
            _ => Err(MonitorError::MalformedTable(
                "mixed single-level and two-level column keys".to_string(),
            )),
        }
    }
}
