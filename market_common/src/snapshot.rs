//! Latest value and day-over-day change per instrument.
use chrono::NaiveDate;
use serde::Serialize;

use crate::instrument::Instrument;
use crate::series::QuoteSeries;

/// Label shown in place of a value when no snapshot is available.
pub const NOT_AVAILABLE: &str = "N/A";

/// Latest value and change against the previous observation, or its absence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Snapshot {
    /// At least two observations exist.
    Available {
        /// Instrument symbol.
        symbol: String,
        /// Date of the latest observation.
        as_of: NaiveDate,
        /// Close of the latest observation.
        latest: f64,
        /// Close of the observation before it.
        previous: f64,
        /// `latest - previous`, unrounded.
        delta: f64,
    },
    /// Fewer than two observations; not an error.
    NoData {
        /// Instrument symbol.
        symbol: String,
    },
}

impl Snapshot {
    /// Instrument symbol.
    pub fn symbol(&self) -> &str {
        match self {
            Snapshot::Available { symbol, .. } | Snapshot::NoData { symbol } => symbol,
        }
    }

    /// Latest close, if available.
    pub fn latest(&self) -> Option<f64> {
        match self {
            Snapshot::Available { latest, .. } => Some(*latest),
            Snapshot::NoData { .. } => None,
        }
    }

    /// Change against the previous close; `0.0` when there is no data.
    pub fn delta(&self) -> f64 {
        match self {
            Snapshot::Available { delta, .. } => *delta,
            Snapshot::NoData { .. } => 0.0,
        }
    }

    /// `true` for the no-data sentinel.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Snapshot::NoData { .. })
    }
}

/// Computes the snapshot of a normalized series.
pub fn snapshot(series: &QuoteSeries) -> Snapshot {
    match series.observations() {
        [.., previous, latest] => Snapshot::Available {
            symbol: series.symbol().to_string(),
            as_of: latest.date,
            latest: latest.close,
            previous: previous.close,
            delta: latest.close - previous.close,
        },
        _ => Snapshot::NoData {
            symbol: series.symbol().to_string(),
        },
    }
}

/// Display strings for one metric card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricCard {
    /// Instrument label.
    pub label: String,
    /// Prefixed two-decimal value, or `N/A`.
    pub value: String,
    /// Signed two-decimal change, or `0`.
    pub delta: String,
}

impl MetricCard {
    /// Formats `snapshot` with the display metadata of `instrument`.
    pub fn from_snapshot(instrument: &Instrument, snapshot: &Snapshot) -> Self {
        match snapshot {
            Snapshot::Available { latest, delta, .. } => MetricCard {
                label: instrument.label.clone(),
                value: instrument.format_value(*latest),
                delta: format!("{:+.2}", delta),
            },
            Snapshot::NoData { .. } => MetricCard {
                label: instrument.label.clone(),
                value: NOT_AVAILABLE.to_string(),
                delta: "0".to_string(),
            },
        }
    }
}
