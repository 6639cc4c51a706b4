//! Data model types used by the monitor's quote sources.
//!
//! - `chart`: Yahoo Finance chart API payloads and their per-day rows.
//! - `synthetic`: offline random-walk price generator.
pub mod chart;
pub mod synthetic;
