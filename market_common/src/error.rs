//! Error types shared by the library core and the monitor binary.
//!
//! `MonitorError` covers the failures that can cross a crate boundary: I/O and
//! JSON problems, provider (network) failures, malformed tables and instrument
//! files, and channel breakage in the fetch fan-out. Shape problems inside a
//! table that the normalizer can work around are *not* errors; they are
//! reported as `NormalizeWarning`s instead.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type for the workspace.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// I/O error originating from the standard library (files, sockets).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// A quote provider could not deliver data (network failure, bad status, empty payload).
    #[error("Provider error: {provider} - {message}")]
    Provider {
        /// Name of the provider that failed.
        provider: String,
        /// Human-readable failure description.
        message: String,
    },

    /// A raw table is structurally broken (e.g. column length differs from the index).
    #[error("Malformed table: {0}")]
    MalformedTable(String),

    /// A serialized series holds a price that cannot be an observation.
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Error while parsing the instruments file into `Instrument` values.
    #[error("Parse instruments file error: {0}")]
    ParseInstrumentsFile(String),

    /// Channel receive failed (all workers gone before reporting).
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// A poisoned mutex was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for MonitorError {
    fn from(err: PoisonError<T>) -> Self {
        MonitorError::MutexLock(err.to_string())
    }
}

impl MonitorError {
    /// Shorthand for a provider failure.
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        MonitorError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
