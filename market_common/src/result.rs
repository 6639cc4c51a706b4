//! Result type alias shared across the workspace.
//!
//! Defaults the error type to `MonitorError`, so functions can simply return `Result<T>`.
use crate::error::MonitorError;

/// Workspace-wide `Result` alias with `MonitorError` as the default error.
pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
