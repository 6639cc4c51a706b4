//! The refresh pipeline: fetch, normalize, snapshot, filter, resolve gaps.
//!
//! Nothing here keeps state between refreshes. The selected window, chart style
//! and history span come in as a [`PageState`]; caching, if wanted, lives in the
//! source passed to [`Dashboard::refresh`].
use chrono::NaiveDate;
use clap::ValueEnum;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::instrument::Instrument;
use crate::normalize::{MissingClosePolicy, NormalizeWarning, Normalized, Normalizer};
use crate::range::RangeWindow;
use crate::series::QuoteSeries;
use crate::snapshot::{MetricCard, Snapshot, snapshot};
use crate::source::{HistorySpan, QuoteSource};

/// How chart series are meant to be drawn.
#[allow(missing_docs)]
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
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    #[default]
    Line,
    Candlestick,
}

/// Settings that hold for the lifetime of a dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Instruments shown, in display order.
    pub instruments: Vec<Instrument>,
    /// Behaviour when a provider table has no `Close` field for an instrument.
    pub close_policy: MissingClosePolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            instruments: Instrument::defaults(),
            close_policy: MissingClosePolicy::default(),
        }
    }
}

/// User selections for one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageState {
    /// Visible time window.
    pub window: RangeWindow,
    /// Chart style.
    pub style: ChartStyle,
    /// History requested from the source.
    pub span: HistorySpan,
}

/// What the chart area of a panel should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartState {
    /// The filtered series has observations.
    Series,
    /// The instrument has data, but none inside the selected window.
    NoDataForPeriod,
    /// The provider returned nothing for the instrument.
    NoDataForInstrument,
}

/// Everything the presentation layer needs for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    /// Instrument shown.
    pub instrument: Instrument,
    /// Formatted metric card.
    pub card: MetricCard,
    /// Snapshot over the full series.
    pub snapshot: Snapshot,
    /// Chart area state.
    pub chart: ChartState,
    /// `true` when the series should be drawn as candles.
    pub candles: bool,
    /// Series restricted to the selected window.
    pub series: QuoteSeries,
    /// Non-trading calendar days inside the window (candlestick style only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<NaiveDate>,
}

/// Overall outcome of a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardStatus {
    /// At least one instrument has data.
    Ready,
    /// Nothing could be shown; `reason` is meant for the user.
    Unavailable {
        /// Why data is unavailable.
        reason: String,
    },
}

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Name of the source that was asked.
    pub source: String,
    /// Selections the view was computed for.
    pub page: PageState,
    /// Overall status.
    pub status: DashboardStatus,
    /// One panel per configured instrument; empty when the fetch failed.
    pub panels: Vec<Panel>,
    /// Normalization problems worth surfacing.
    pub warnings: Vec<NormalizeWarning>,
}

impl DashboardView {
    /// `true` when the view has something to show.
    pub fn is_ready(&self) -> bool {
        self.status == DashboardStatus::Ready
    }
}

/// Stateless refresh pipeline for a fixed instrument list.
#[derive(Debug, Clone)]
pub struct Dashboard {
    config: DashboardConfig,
    normalizer: Normalizer,
}

impl Dashboard {
    /// Creates a dashboard.
    pub fn new(config: DashboardConfig) -> Self {
        let normalizer = Normalizer::new(config.close_policy);
        Dashboard { config, normalizer }
    }

    /// Configured instruments.
    pub fn instruments(&self) -> &[Instrument] {
        &self.config.instruments
    }

    /// Runs one refresh against `source`.
    ///
    /// A fetch failure yields an `Unavailable` view with no panels; it is never
    /// returned as an error.
    pub fn refresh<S>(&self, source: &S, page: &PageState) -> DashboardView
    where
        S: QuoteSource + ?Sized,
    {
        let instruments = self.instruments();
        info!(
            "Refreshing {} instrument(s) from {} (span {}, window {})",
            instruments.len(),
            source.name(),
            page.span,
            page.window
        );

        let table = match source.fetch(instruments, page.span) {
            Ok(table) => table,
            Err(e) => {
                error!("Fetch from {} failed: {}", source.name(), e);
                return DashboardView {
                    source: source.name().to_string(),
                    page: *page,
                    status: DashboardStatus::Unavailable {
                        reason: e.to_string(),
                    },
                    panels: Vec::new(),
                    warnings: Vec::new(),
                };
            }
        };

        let normalized = self.normalizer.normalize(&table, instruments);
        for warning in &normalized.warnings {
            warn!("{}", warning);
        }

        let status = if normalized.is_empty() {
            DashboardStatus::Unavailable {
                reason: "provider returned no observations".to_string(),
            }
        } else {
            DashboardStatus::Ready
        };

        DashboardView {
            source: source.name().to_string(),
            page: *page,
            status,
            panels: self.panels(&normalized, page),
            warnings: normalized.warnings,
        }
    }

    /// Builds one panel per configured instrument from already normalized data.
    pub fn panels(&self, normalized: &Normalized, page: &PageState) -> Vec<Panel> {
        self.instruments()
            .iter()
            .map(|instrument| build_panel(instrument, normalized.get(&instrument.symbol), page))
            .collect()
    }
}

fn build_panel(instrument: &Instrument, series: Option<&QuoteSeries>, page: &PageState) -> Panel {
    let Some(series) = series else {
        let snap = Snapshot::NoData {
            symbol: instrument.symbol.clone(),
        };
        return Panel {
            instrument: instrument.clone(),
            card: MetricCard::from_snapshot(instrument, &snap),
            snapshot: snap,
            chart: ChartState::NoDataForInstrument,
            candles: false,
            series: QuoteSeries::empty(&instrument.symbol),
            gaps: Vec::new(),
        };
    };

    let snap = snapshot(series);
    let filtered = page.window.apply(series);
    let chart = if filtered.is_empty() {
        ChartState::NoDataForPeriod
    } else {
        ChartState::Series
    };
    let candles = page.style == ChartStyle::Candlestick && filtered.has_ohlc();
    let gaps = if page.style == ChartStyle::Candlestick {
        filtered.calendar_gaps()
    } else {
        Vec::new()
    };

    Panel {
        instrument: instrument.clone(),
        card: MetricCard::from_snapshot(instrument, &snap),
        snapshot: snap,
        chart,
        candles,
        series: filtered,
        gaps,
    }
}
