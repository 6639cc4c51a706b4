//! Printing a `DashboardView` for a terminal or as JSON.
use market_common::dashboard::{ChartState, DashboardStatus, DashboardView, Panel};
use market_common::{Observation, Result};
use std::io::Write;

use crate::args::OutputFormat;

/// Observations listed under each chart summary.
const TAIL_ROWS: usize = 5;

/// Writes `view` to `out` in the requested format.
pub fn render<W: Write>(out: &mut W, view: &DashboardView, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, view)?;
            writeln!(out)?;
        }
        OutputFormat::Text => render_text(out, view)?,
    }
    Ok(())
}

fn render_text<W: Write>(out: &mut W, view: &DashboardView) -> Result<()> {
    writeln!(
        out,
        "Market monitor | source {} | window {} | style {}",
        view.source, view.page.window, view.page.style
    )?;

    if let DashboardStatus::Unavailable { reason } = &view.status {
        writeln!(out, "Data unavailable: {}", reason)?;
        if view.panels.is_empty() {
            writeln!(out, "Try again later or pick another --source.")?;
            return Ok(());
        }
    }

    writeln!(out)?;
    for panel in &view.panels {
        writeln!(
            out,
            "{:<12} {:>14} {:>10}",
            panel.card.label, panel.card.value, panel.card.delta
        )?;
    }

    for panel in &view.panels {
        writeln!(out)?;
        render_chart(out, panel)?;
    }
    Ok(())
}

fn render_chart<W: Write>(out: &mut W, panel: &Panel) -> Result<()> {
    let title = format!("{} ({})", panel.instrument.label, panel.instrument.symbol);
    match panel.chart {
        ChartState::NoDataForInstrument => {
            writeln!(out, "{}: no data", title)?;
            return Ok(());
        }
        ChartState::NoDataForPeriod => {
            writeln!(out, "{}: no data for this period", title)?;
            return Ok(());
        }
        ChartState::Series => {}
    }

    let series = &panel.series;
    let closes = series.closes();
    let low = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let high = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if let (Some(first), Some(last)) = (series.min_date(), series.max_date()) {
        writeln!(
            out,
            "{}: {} observation(s) {}..{}, range {}..{}",
            title,
            series.len(),
            first,
            last,
            panel.instrument.format_value(low),
            panel.instrument.format_value(high)
        )?;
    }
    if !panel.gaps.is_empty() {
        writeln!(out, "  {} non-trading day(s) compressed", panel.gaps.len())?;
    }

    let skip = series.len().saturating_sub(TAIL_ROWS);
    for observation in &series.observations()[skip..] {
        writeln!(out, "  {}", format_row(observation, panel.candles))?;
    }
    Ok(())
}

fn format_row(observation: &Observation, candles: bool) -> String {
    match (candles, observation.open, observation.high, observation.low) {
        (true, Some(open), Some(high), Some(low)) => format!(
            "{}  O {:.2}  H {:.2}  L {:.2}  C {:.2}",
            observation.date, open, high, low, observation.close
        ),
        _ => format!("{}  {:.2}", observation.date, observation.close),
    }
}
