//! Core of the market monitor: everything between a provider's raw price table
//! and what a dashboard shows for each instrument.
//!
//! This crate aggregates:
//! - `error`: unified error type `MonitorError` used across the workspace.
//! - `result`: handy `Result<T, MonitorError>` alias.
//! - `instrument`: tracked instruments and watch-list parsing.
//! - `table`: raw provider tables (flat or two-level columns).
//! - `series`: normalized per-instrument observations.
//! - `normalize`: raw table to per-instrument series.
//! - `snapshot`: latest value and day-over-day change.
//! - `range`: relative time windows and the range filter.
//! - `gaps`: calendar gaps for candlestick axes.
//! - `source`: the quote-source seam, file source and caching decorator.
//! - `dashboard`: the refresh pipeline tying the above together.
#![warn(missing_docs)]
pub mod dashboard;
pub mod error;
pub mod gaps;
pub mod instrument;
pub mod normalize;
pub mod range;
pub mod result;
pub mod series;
pub mod snapshot;
pub mod source;
pub mod table;

pub use dashboard::{ChartStyle, Dashboard, DashboardConfig, DashboardStatus, DashboardView, PageState};
pub use error::MonitorError;
pub use instrument::{Instrument, InstrumentParser};
pub use normalize::{MissingClosePolicy, Normalized, Normalizer, normalize};
pub use range::{RangeWindow, filter_range};
pub use result::Result;
pub use series::{Observation, QuoteSeries};
pub use snapshot::{MetricCard, Snapshot, snapshot};
pub use source::{CachedSource, FileSource, HistorySpan, QuoteSource};
pub use table::{ColumnKey, RawQuoteTable, RawTimestamp};
