//! Command-line arguments for the market monitor.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::{Parser, ValueEnum};
use market_common::{ChartStyle, HistorySpan, MissingClosePolicy, RangeWindow};
use std::path::PathBuf;
use strum_macros::Display;

/// Where price tables come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    /// Yahoo Finance chart API.
    Yahoo,
    /// JSON table saved with `--save-table`.
    File,
    /// Offline random walk.
    Synthetic,
}

/// How the dashboard is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Metric cards and chart summaries for a terminal.
    Text,
    /// The whole dashboard view as JSON.
    Json,
}

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Data source.
    #[clap(long, value_enum, default_value_t = SourceKind::Yahoo)]
    pub source: SourceKind,

    /// JSON table to read when `--source file` is selected.
    #[clap(long, required_if_eq("source", "file"))]
    pub table: Option<PathBuf>,

    /// Text file with one instrument symbol per line (defaults to the five tracked instruments).
    #[clap(long)]
    pub instruments: Option<PathBuf>,

    /// Visible time window.
    #[clap(long, value_enum, default_value_t = RangeWindow::OneMonth)]
    pub window: RangeWindow,

    /// History requested from the source.
    #[clap(long, value_enum, default_value_t = HistorySpan::Max)]
    pub span: HistorySpan,

    /// Chart style; candlestick output includes non-trading days to compress.
    #[clap(long, value_enum, default_value_t = ChartStyle::Line)]
    pub style: ChartStyle,

    /// Output format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// What to do when the provider sends no Close field for an instrument.
    #[clap(long, value_enum, default_value_t = MissingClosePolicy::FirstNumeric)]
    pub close_policy: MissingClosePolicy,

    /// Seconds a fetched table is reused before refetching.
    #[clap(long, default_value_t = 900)]
    pub cache_ttl_secs: u64,

    /// Refresh every N seconds until Ctrl+C; press Enter to force a refetch.
    #[clap(long)]
    pub watch: Option<u64>,

    /// Seed for the synthetic source.
    #[clap(long, default_value_t = 42)]
    pub seed: u64,

    /// Also save the fetched raw table as JSON to this path.
    #[clap(long)]
    pub save_table: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["market_monitor"]);
        assert_eq!(args.source, SourceKind::Yahoo);
        assert_eq!(args.window, RangeWindow::OneMonth);
        assert_eq!(args.span, HistorySpan::Max);
        assert_eq!(args.style, ChartStyle::Line);
        assert_eq!(args.close_policy, MissingClosePolicy::FirstNumeric);
        assert_eq!(args.cache_ttl_secs, 900);
        assert!(args.watch.is_none());
    }

    #[test]
    fn test_value_names() {
        let args = Args::parse_from([
            "market_monitor",
            "--source",
            "synthetic",
            "--window",
            "5y",
            "--span",
            "2y",
            "--style",
            "candlestick",
            "--format",
            "json",
            "--close-policy",
            "skip-instrument",
        ]);
        assert_eq!(args.source, SourceKind::Synthetic);
        assert_eq!(args.window, RangeWindow::FiveYears);
        assert_eq!(args.span, HistorySpan::TwoYears);
        assert_eq!(args.style, ChartStyle::Candlestick);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.close_policy, MissingClosePolicy::SkipInstrument);
    }

    #[test]
    fn test_file_source_requires_table() {
        assert!(Args::try_parse_from(["market_monitor", "--source", "file"]).is_err());
        let args =
            Args::try_parse_from(["market_monitor", "--source", "file", "--table", "t.json"])
                .unwrap();
        assert_eq!(args.table, Some(PathBuf::from("t.json")));
    }
}
