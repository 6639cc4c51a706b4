//! Provider table normalization.
//!
//! Turns a [`RawQuoteTable`] into one [`QuoteSeries`] per instrument. The
//! provider may send:
//!
//! - a flat table whose columns are instruments (close only),
//! - a flat table whose columns are fields of a single instrument,
//! - a two-level table keyed `(field, instrument)` (field-major), or
//! - a two-level table keyed `(instrument, field)` (instrument-major).
//!
//! Which level carries field names is decided by [`detect_orientation`]. Shape
//! problems never fail the call: they come back as [`NormalizeWarning`]s next
//! to whatever series could be recovered.
use chrono::NaiveDate;
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::instrument::Instrument;
use crate::series::{Observation, QuoteSeries};
use crate::table::{ColumnKey, ColumnLayout, RawQuoteTable, RawTimestamp};

/// Field names recognised on either column level.
pub const KNOWN_FIELDS: [&str; 6] = ["Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// What to do with an instrument whose columns expose no `Close` field.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MissingClosePolicy {
    /// Use the first discovered price field as close and warn.
    #[default]
    FirstNumeric,
    /// Leave the instrument out of the result and warn.
    SkipInstrument,
}

/// Which column level carries field names in a two-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `(field, instrument)` keys.
    FieldMajor,
    /// `(instrument, field)` keys.
    InstrumentMajor,
}

/// Recoverable problem found while normalizing.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeWarning {
    /// The table could not be read at all; no series were produced.
    #[error("malformed table: {reason}")]
    MalformedTable {
        /// Validation failure.
        reason: String,
    },
    /// Neither column level exposes a known field name; field-major was assumed.
    #[error("column orientation unknown, assuming field-major")]
    OrientationUnknown,
    /// `Close` was missing and another field stands in for it.
    #[error("{symbol}: no Close field, using '{field}' instead")]
    CloseSubstituted {
        /// Instrument symbol.
        symbol: String,
        /// Field used as close.
        field: String,
    },
    /// The instrument was left out of the result.
    #[error("{symbol}: skipped ({reason})")]
    InstrumentSkipped {
        /// Instrument symbol.
        symbol: String,
        /// Why it was skipped.
        reason: String,
    },
    /// An expected instrument has no observations in the table.
    #[error("{symbol}: no observations in provider response")]
    InstrumentMissing {
        /// Instrument symbol.
        symbol: String,
    },
    /// Rows whose timestamp could not be read were dropped.
    #[error("{count} row(s) dropped: unreadable timestamp")]
    UnreadableTimestamps {
        /// Number of dropped rows.
        count: usize,
    },
}

/// Per-instrument series recovered from one provider table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Non-empty series keyed by symbol.
    pub series: BTreeMap<String, QuoteSeries>,
    /// Problems met on the way.
    pub warnings: Vec<NormalizeWarning>,
}

impl Normalized {
    /// Series for `symbol`, if the provider delivered any observation for it.
    pub fn get(&self, symbol: &str) -> Option<&QuoteSeries> {
        self.series.get(symbol)
    }

    /// `true` when no instrument has any observation.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Re-expresses the series as an instrument-major raw table.
    ///
    /// Normalizing the returned table reproduces `self.series`.
    pub fn to_raw(&self) -> RawQuoteTable {
        let dates: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|s| s.dates())
            .collect();
        let row_of: BTreeMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut table = RawQuoteTable::new(dates.iter().map(|d| RawTimestamp::from(*d)).collect());
        for (symbol, series) in &self.series {
            let fields: [(&str, fn(&Observation) -> Option<f64>); 4] = [
                ("Open", |o| o.open),
                ("High", |o| o.high),
                ("Low", |o| o.low),
                ("Close", |o| Some(o.close)),
            ];
            for (field, read) in fields {
                if series.observations().iter().all(|o| read(o).is_none()) {
                    continue;
                }
                let mut values = vec![None; dates.len()];
                for observation in series.observations() {
                    values[row_of[&observation.date]] = read(observation);
                }
                table.push_column(ColumnKey::pair(symbol, field), values);
            }
        }
        table
    }
}

/// Decides which level of two-level keys carries field names.
///
/// A level exposing `Close` wins; otherwise a level exposing any known field
/// wins, outer level first. Returns `None` when neither level names a field.
pub fn detect_orientation<'a, I>(keys: I) -> Option<Orientation>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let keys: Vec<(&str, &str)> = keys.into_iter().collect();
    let outer_has = |pred: &dyn Fn(&str) -> bool| keys.iter().any(|(outer, _)| pred(outer));
    let inner_has = |pred: &dyn Fn(&str) -> bool| keys.iter().any(|(_, inner)| pred(inner));

    if outer_has(&is_close) {
        Some(Orientation::FieldMajor)
    } else if inner_has(&is_close) {
        Some(Orientation::InstrumentMajor)
    } else if outer_has(&is_known_field) {
        Some(Orientation::FieldMajor)
    } else if inner_has(&is_known_field) {
        Some(Orientation::InstrumentMajor)
    } else {
        None
    }
}

fn is_close(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("Close")
}

fn is_known_field(name: &str) -> bool {
    KNOWN_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name.trim()))
}

fn is_volume(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("Volume")
}

fn valid_price(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Column indices of one instrument's fields, in discovery order.
#[derive(Debug, Default)]
struct FieldColumns {
    fields: Vec<(String, usize)>,
}

impl FieldColumns {
    fn add(&mut self, field: &str, column: usize) {
        if !self.fields.iter().any(|(f, _)| f.eq_ignore_ascii_case(field)) {
            self.fields.push((field.trim().to_string(), column));
        }
    }

    fn find(&self, field: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, c)| *c)
    }

    /// First field that can stand in for close: anything but volume.
    fn first_price(&self) -> Option<(&str, usize)> {
        self.fields
            .iter()
            .find(|(f, _)| !is_volume(f))
            .map(|(f, c)| (f.as_str(), *c))
    }
}

/// Table normalizer configured with a missing-close policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    policy: MissingClosePolicy,
}

impl Normalizer {
    /// Creates a normalizer.
    pub fn new(policy: MissingClosePolicy) -> Self {
        Normalizer { policy }
    }

    /// Policy in effect.
    pub fn policy(&self) -> MissingClosePolicy {
        self.policy
    }

    /// Normalizes `table`. `expected` names the instruments that were requested;
    /// it resolves the symbol of single-instrument flat tables and drives the
    /// missing-instrument warnings.
    pub fn normalize(&self, table: &RawQuoteTable, expected: &[Instrument]) -> Normalized {
        let mut out = Normalized::default();
        if table.is_empty() {
            debug!("Normalizing empty table");
            self.report_missing(&mut out, expected);
            return out;
        }

        let layout = match table.validate() {
            Ok(layout) => layout,
            Err(e) => {
                out.warnings.push(NormalizeWarning::MalformedTable {
                    reason: e.to_string(),
                });
                return out;
            }
        };

        let dates: Vec<Option<NaiveDate>> = table.index.iter().map(RawTimestamp::to_date).collect();
        let unreadable = dates.iter().filter(|d| d.is_none()).count();
        if unreadable > 0 {
            out.warnings
                .push(NormalizeWarning::UnreadableTimestamps { count: unreadable });
        }

        let groups = match layout {
            ColumnLayout::Flat => self.group_flat(table, expected, &mut out.warnings),
            ColumnLayout::TwoLevel => self.group_two_level(table, &mut out.warnings),
        };

        for (symbol, columns) in groups {
            let close_column = match columns.find("Close") {
                Some(column) => column,
                None => match (self.policy, columns.first_price()) {
                    (MissingClosePolicy::FirstNumeric, Some((field, column))) => {
                        out.warnings.push(NormalizeWarning::CloseSubstituted {
                            symbol: symbol.clone(),
                            field: field.to_string(),
                        });
                        column
                    }
                    (MissingClosePolicy::FirstNumeric, None) => {
                        out.warnings.push(NormalizeWarning::InstrumentSkipped {
                            symbol: symbol.clone(),
                            reason: "no price field".to_string(),
                        });
                        continue;
                    }
                    (MissingClosePolicy::SkipInstrument, _) => {
                        out.warnings.push(NormalizeWarning::InstrumentSkipped {
                            symbol: symbol.clone(),
                            reason: "no Close field".to_string(),
                        });
                        continue;
                    }
                },
            };

            let series = build_series(&symbol, table, &dates, &columns, close_column);
            if !series.is_empty() {
                out.series.insert(symbol, series);
            }
        }

        self.report_missing(&mut out, expected);
        debug!(
            "Normalized {} instrument(s) from {} row(s), {} warning(s)",
            out.series.len(),
            table.row_count(),
            out.warnings.len()
        );
        out
    }

    fn report_missing(&self, out: &mut Normalized, expected: &[Instrument]) {
        for instrument in expected {
            let skipped = out.warnings.iter().any(|w| {
                matches!(w, NormalizeWarning::InstrumentSkipped { symbol, .. } if *symbol == instrument.symbol)
            });
            if !skipped && !out.series.contains_key(&instrument.symbol) {
                out.warnings.push(NormalizeWarning::InstrumentMissing {
                    symbol: instrument.symbol.clone(),
                });
            }
        }
    }

    fn group_flat(
        &self,
        table: &RawQuoteTable,
        expected: &[Instrument],
        warnings: &mut Vec<NormalizeWarning>,
    ) -> BTreeMap<String, FieldColumns> {
        let names: Vec<&str> = table
            .columns
            .iter()
            .filter_map(|c| match &c.key {
                ColumnKey::Flat(name) => Some(name.as_str()),
                ColumnKey::Pair(..) => None,
            })
            .collect();
        let mut groups: BTreeMap<String, FieldColumns> = BTreeMap::new();
        let sole = match expected {
            [only] => Some(only.symbol.clone()),
            _ => None,
        };

        if names.iter().any(|n| is_known_field(n)) {
            // columns are the fields of one instrument
            let Some(symbol) = sole else {
                warnings.push(NormalizeWarning::InstrumentSkipped {
                    symbol: "?".to_string(),
                    reason: format!(
                        "single-instrument table but {} instruments requested",
                        expected.len()
                    ),
                });
                return groups;
            };
            let entry = groups.entry(symbol).or_default();
            for (column, name) in names.iter().enumerate() {
                entry.add(name, column);
            }
        } else if names.len() == 1 && sole.is_some() {
            // one unnamed series for the one requested instrument
            if let Some(symbol) = sole {
                groups.entry(symbol).or_default().add("Close", 0);
            }
        } else {
            // columns are instruments, values are closes
            for (column, name) in names.iter().enumerate() {
                groups.entry(name.trim().to_string()).or_default().add("Close", column);
            }
        }
        groups
    }

    fn group_two_level(
        &self,
        table: &RawQuoteTable,
        warnings: &mut Vec<NormalizeWarning>,
    ) -> BTreeMap<String, FieldColumns> {
        let keys: Vec<(&str, &str)> = table
            .columns
            .iter()
            .filter_map(|c| match &c.key {
                ColumnKey::Pair(outer, inner) => Some((outer.as_str(), inner.as_str())),
                ColumnKey::Flat(_) => None,
            })
            .collect();

        let orientation = detect_orientation(keys.iter().copied()).unwrap_or_else(|| {
            warnings.push(NormalizeWarning::OrientationUnknown);
            Orientation::FieldMajor
        });
        debug!("Two-level table detected as {:?}", orientation);

        let mut groups: BTreeMap<String, FieldColumns> = BTreeMap::new();
        for (column, (outer, inner)) in keys.into_iter().enumerate() {
            let (field, symbol) = match orientation {
                Orientation::FieldMajor => (outer, inner),
                Orientation::InstrumentMajor => (inner, outer),
            };
            groups
                .entry(symbol.trim().to_string())
                .or_default()
                .add(field, column);
        }
        groups
    }
}

fn build_series(
    symbol: &str,
    table: &RawQuoteTable,
    dates: &[Option<NaiveDate>],
    columns: &FieldColumns,
    close_column: usize,
) -> QuoteSeries {
    let value = |column: Option<usize>, row: usize| -> Option<f64> {
        column.and_then(|c| valid_price(table.columns[c].values[row]))
    };
    let open = columns.find("Open");
    let high = columns.find("High");
    let low = columns.find("Low");

    let observations = dates
        .iter()
        .enumerate()
        .filter_map(|(row, date)| {
            let date = (*date)?;
            let close = value(Some(close_column), row)?;
            Some(Observation {
                date,
                open: value(open, row),
                high: value(high, row),
                low: value(low, row),
                close,
            })
        })
        .collect();
    QuoteSeries::new(symbol, observations)
}

/// Normalizes with the default policy.
pub fn normalize(table: &RawQuoteTable, expected: &[Instrument]) -> Normalized {
    Normalizer::default().normalize(table, expected)
}
