//! Market Monitor: a terminal dashboard for a handful of exchange rates and
//! commodities. It fetches daily history from a quote source, normalizes it,
//! and prints a metric card (latest value and day-over-day change) plus a chart
//! summary for every tracked instrument.
//!
//! Usage example (CLI):
//! ```bash
//! market_monitor --window 3m --style candlestick
//! market_monitor --source synthetic --watch 60
//! market_monitor --source file --table saved.json --format json
//! ```
//!
//! With `--watch N` the dashboard is redrawn every `N` seconds until Ctrl+C.
//! Pressing Enter drops the cached table and refetches immediately.
#![warn(missing_docs)]
mod args;
mod model;
mod render;
mod yahoo;

use crate::args::{Args, OutputFormat, SourceKind};
use crate::model::synthetic::SyntheticSource;
use crate::yahoo::YahooSource;
use clap::Parser;
use crossbeam_channel::{Receiver, after, bounded, never, select, unbounded};
use log::{debug, info, warn};
use market_common::{
    CachedSource, Dashboard, DashboardConfig, FileSource, Instrument, InstrumentParser,
    MonitorError, PageState, QuoteSource, Result,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::thread;
use std::time::Duration;

type Source = CachedSource<Box<dyn QuoteSource>>;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let instruments = load_instruments(&args)?;
    info!(
        "Tracking: {}",
        instruments
            .iter()
            .map(|i| i.symbol.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let source = CachedSource::new(build_source(&args)?, Duration::from_secs(args.cache_ttl_secs));
    let dashboard = Dashboard::new(DashboardConfig {
        instruments,
        close_policy: args.close_policy,
    });
    let page = PageState {
        window: args.window,
        style: args.style,
        span: args.span,
    };

    if let Some(path) = &args.save_table {
        match source.fetch(dashboard.instruments(), page.span) {
            Ok(table) => FileSource::write(path, &table)?,
            Err(e) => warn!("Nothing saved to {}: {}", path.display(), e),
        }
    }

    match args.watch {
        Some(secs) => watch(&dashboard, &source, &page, args.format, Duration::from_secs(secs.max(1))),
        None => show(&dashboard, &source, &page, args.format),
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Reads the watch list from `--instruments`, or falls back to the default five.
fn load_instruments(args: &Args) -> Result<Vec<Instrument>> {
    match &args.instruments {
        Some(path) => {
            let file = File::open(path)?;
            Instrument::parse_from_file(BufReader::new(file))
        }
        None => Ok(Instrument::defaults()),
    }
}

fn build_source(args: &Args) -> Result<Box<dyn QuoteSource>> {
    let source: Box<dyn QuoteSource> = match args.source {
        SourceKind::Yahoo => Box::new(YahooSource::new()?),
        SourceKind::Synthetic => Box::new(SyntheticSource::new(args.seed)),
        SourceKind::File => {
            let path = args.table.as_ref().ok_or_else(|| {
                MonitorError::Io(io::Error::new(
                    ErrorKind::InvalidInput,
                    "--table is required with --source file",
                ))
            })?;
            Box::new(FileSource::new(path))
        }
    };
    debug!("Using {} source ({})", args.source, source.name());
    Ok(source)
}

/// Refreshes once and prints the result to stdout.
fn show(dashboard: &Dashboard, source: &Source, page: &PageState, format: OutputFormat) -> Result<()> {
    let view = dashboard.refresh(source, page);
    if !view.is_ready() {
        warn!("Dashboard data unavailable");
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render::render(&mut out, &view, format)?;
    out.flush()?;
    Ok(())
}

/// Redraws every `interval` until Ctrl+C; a line on stdin forces a refetch.
fn watch(
    dashboard: &Dashboard,
    source: &Source,
    page: &PageState,
    format: OutputFormat,
    interval: Duration,
) -> Result<()> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Stopping...");
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| MonitorError::Io(io::Error::other(e.to_string())))?;

    let mut refresh_rx = spawn_refresh_reader();
    info!(
        "Refreshing every {}s. Press Enter to refetch, Ctrl+C to exit.",
        interval.as_secs()
    );

    loop {
        show(dashboard, source, page, format)?;

        let timer = after(interval);
        loop {
            let mut stdin_closed = false;
            let redraw = select! {
                recv(stop_rx) -> _ => return Ok(()),
                recv(refresh_rx) -> msg => match msg {
                    Ok(()) => {
                        source.invalidate()?;
                        true
                    }
                    Err(_) => {
                        stdin_closed = true;
                        false
                    }
                },
                recv(timer) -> _ => true,
            };
            if stdin_closed {
                debug!("stdin closed; manual refresh disabled");
                refresh_rx = never();
            }
            if redraw {
                break;
            }
        }
    }
}

/// Sends one message per line typed on stdin; the channel closes at EOF.
fn spawn_refresh_reader() -> Receiver<()> {
    let (tx, rx) = unbounded::<()>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}
