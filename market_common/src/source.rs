//! Quote sources and the caching decorator.
//!
//! A `QuoteSource` is whatever hands the pipeline a [`RawQuoteTable`]: a network
//! provider, a JSON file, a generator. `CachedSource` wraps any of them and
//! serves the last successful table until its TTL runs out or the caller asks
//! for a refresh.
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumString};

use crate::instrument::Instrument;
use crate::result::Result;
use crate::table::RawQuoteTable;

/// Default cache lifetime: fifteen minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(900);

/// How much history to request from a source.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum HistorySpan {
    #[value(name = "1y")]
    #[strum(serialize = "1y")]
    #[serde(rename = "1y")]
    OneYear,
    #[value(name = "2y")]
    #[strum(serialize = "2y")]
    #[serde(rename = "2y")]
    TwoYears,
    #[default]
    #[value(name = "max")]
    #[strum(serialize = "max")]
    #[serde(rename = "max")]
    Max,
}

impl HistorySpan {
    /// Span length in days; `None` means everything the source has.
    pub fn lookback_days(self) -> Option<u64> {
        match self {
            HistorySpan::OneYear => Some(365),
            HistorySpan::TwoYears => Some(730),
            HistorySpan::Max => None,
        }
    }
}

/// Producer of raw provider tables.
pub trait QuoteSource {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Fetches daily history for `instruments` over `span`.
    fn fetch(&self, instruments: &[Instrument], span: HistorySpan) -> Result<RawQuoteTable>;
}

impl<S: QuoteSource + ?Sized> QuoteSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, instruments: &[Instrument], span: HistorySpan) -> Result<RawQuoteTable> {
        (**self).fetch(instruments, span)
    }
}

/// Reads a table previously saved as JSON.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }

    /// Saves `table` as JSON so it can be replayed later.
    pub fn write(path: &Path, table: &RawQuoteTable) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, table)?;
        writer.flush()?;
        info!("Saved {} row(s) to {}", table.row_count(), path.display());
        Ok(())
    }
}

impl QuoteSource for FileSource {
    fn name(&self) -> &str {
        "FILE"
    }

    fn fetch(&self, _instruments: &[Instrument], _span: HistorySpan) -> Result<RawQuoteTable> {
        let reader = BufReader::new(File::open(&self.path)?);
        let table: RawQuoteTable = serde_json::from_reader(reader)?;
        debug!(
            "Loaded {} row(s), {} column(s) from {}",
            table.row_count(),
            table.columns.len(),
            self.path.display()
        );
        Ok(table)
    }
}

struct CacheEntry {
    fetched_at: Instant,
    span: HistorySpan,
    symbols: Vec<String>,
    table: RawQuoteTable,
}

/// Decorator that remembers the last successful fetch for a fixed time.
///
/// A cached table is reused only for the same span and instrument list.
/// Failed fetches are never cached.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl<S: QuoteSource> CachedSource<S> {
    /// Wraps `inner` with a cache living `ttl`.
    pub fn new(inner: S, ttl: Duration) -> Self {
        CachedSource {
            inner,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Drops the cached table so the next fetch goes to the inner source.
    pub fn invalidate(&self) -> Result<()> {
        let mut entry = self.entry.lock()?;
        if entry.take().is_some() {
            debug!("Cache for {} invalidated", self.inner.name());
        }
        Ok(())
    }

    /// Wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: QuoteSource> QuoteSource for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, instruments: &[Instrument], span: HistorySpan) -> Result<RawQuoteTable> {
        let symbols: Vec<String> = instruments.iter().map(|i| i.symbol.clone()).collect();
        let mut entry = self.entry.lock()?;

        if let Some(cached) = entry.as_ref() {
            let fresh = cached.fetched_at.elapsed() < self.ttl;
            if fresh && cached.span == span && cached.symbols == symbols {
                debug!(
                    "Cache hit for {} ({}s old)",
                    self.inner.name(),
                    cached.fetched_at.elapsed().as_secs()
                );
                return Ok(cached.table.clone());
            }
        }

        let table = self.inner.fetch(instruments, span)?;
        *entry = Some(CacheEntry {
            fetched_at: Instant::now(),
            span,
            symbols,
            table: table.clone(),
        });
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::table::ColumnKey;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new() -> Self {
            CountingSource {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QuoteSource for CountingSource {
        fn name(&self) -> &str {
            "COUNTING"
        }

        fn fetch(&self, _instruments: &[Instrument], _span: HistorySpan) -> Result<RawQuoteTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(MonitorError::provider("COUNTING", "offline"));
            }
            let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let mut table = RawQuoteTable::new(vec![day.into()]);
            table.push_column(ColumnKey::pair("Close", "GC=F"), vec![Some(1.0)]);
            Ok(table)
        }
    }

    #[test]
    fn test_cache_hit_within_ttl() {
        let cached = CachedSource::new(CountingSource::new(), Duration::from_secs(3600));
        let instruments = Instrument::defaults();
        let first = cached.fetch(&instruments, HistorySpan::Max).unwrap();
        let second = cached.fetch(&instruments, HistorySpan::Max).unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().calls(), 1);
    }

    #[test]
    fn test_expired_entry_refetches() {
        let cached = CachedSource::new(CountingSource::new(), Duration::ZERO);
        let instruments = Instrument::defaults();
        cached.fetch(&instruments, HistorySpan::Max).unwrap();
        cached.fetch(&instruments, HistorySpan::Max).unwrap();
        assert_eq!(cached.inner().calls(), 2);
    }

    #[test]
    fn test_invalidate_and_span_change_refetch() {
        let cached = CachedSource::new(CountingSource::new(), Duration::from_secs(3600));
        let instruments = Instrument::defaults();
        cached.fetch(&instruments, HistorySpan::Max).unwrap();
        cached.invalidate().unwrap();
        cached.fetch(&instruments, HistorySpan::Max).unwrap();
        assert_eq!(cached.inner().calls(), 2);

        cached.fetch(&instruments, HistorySpan::OneYear).unwrap();
        assert_eq!(cached.inner().calls(), 3);

        cached.fetch(&instruments[..1], HistorySpan::OneYear).unwrap();
        assert_eq!(cached.inner().calls(), 4);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let source = CountingSource::new();
        source.fail.store(true, Ordering::SeqCst);
        let cached = CachedSource::new(source, Duration::from_secs(3600));
        let instruments = Instrument::defaults();
        assert!(cached.fetch(&instruments, HistorySpan::Max).is_err());

        cached.inner().fail.store(false, Ordering::SeqCst);
        assert!(cached.fetch(&instruments, HistorySpan::Max).is_ok());
        assert!(cached.fetch(&instruments, HistorySpan::Max).is_ok());
        assert_eq!(cached.inner().calls(), 2);
    }

    #[test]
    fn test_file_source_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "market_common_file_source_{}.json",
            std::process::id()
        ));
        let table = CountingSource::new()
            .fetch(&[], HistorySpan::Max)
            .unwrap();
        FileSource::write(&path, &table).unwrap();
        // the whole document is on disk once write returns
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, serde_json::to_string_pretty(&table).unwrap());

        let loaded = FileSource::new(&path)
            .fetch(&Instrument::defaults(), HistorySpan::Max)
            .unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_file_source_missing_file() {
        let result = FileSource::new("/nonexistent/market_table.json")
            .fetch(&[], HistorySpan::Max);
        assert!(matches!(result, Err(MonitorError::Io(_))));
    }

    #[test]
    fn test_history_span_labels() {
        assert_eq!(HistorySpan::TwoYears.to_string(), "2y");
        assert_eq!("MAX".parse::<HistorySpan>().unwrap(), HistorySpan::Max);
        assert_eq!(HistorySpan::OneYear.lookback_days(), Some(365));
    }
}
