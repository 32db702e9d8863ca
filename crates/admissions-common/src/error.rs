//! Error types shared by the admissions crates

use thiserror::Error;

/// Result type alias for shared helpers
pub type Result<T> = std::result::Result<T, AdmissionsError>;

/// Errors raised by shared helpers
///
/// These describe bad input rather than infrastructure failures, so callers
/// at the HTTP boundary map them to client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionsError {
    #[error("Invalid timestamp '{value}': expected RFC 3339 (2026-01-31T12:00:00Z) or a date (2026-01-31)")]
    InvalidTimestamp { value: String },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    #[error("Invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),
}
