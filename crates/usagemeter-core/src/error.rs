//! Error types for usagemeter
//!
//! This module defines the error types used throughout the usagemeter library.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use usagemeter_core::error::{ErrorKind, MeterError, Result};
//!
//! fn parse_limit(raw: &str) -> Result<u64> {
//!     raw.parse()
//!         .map_err(|_| MeterError::InvalidArgument(format!("limit '{raw}'")))
//! }
//!
//! let err = parse_limit("ten").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidInput);
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for usagemeter operations
#[derive(Error, Debug)]
pub enum MeterError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error while fetching a pricing table
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The event store failed to answer a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Granularity outside of day/week/month/year
    #[error("Invalid granularity: '{0}'. Expected one of day, week, month, year")]
    InvalidGranularity(String),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Date range with start after end
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Usage event failed validation before being recorded
    #[error("Invalid usage event: {0}")]
    InvalidEvent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller's deadline passed before the composed result was complete
    #[error("Query timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Coarse classification so the boundary layer can map errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Storage connectivity or read failure
    Storage,
    /// Bad parameters supplied by the caller
    InvalidInput,
    /// Deadline exceeded or cancelled
    Timeout,
    /// Process configuration problem
    Config,
}

impl MeterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
            Self::InvalidGranularity(_)
            | Self::InvalidDate(_)
            | Self::InvalidDateRange { .. }
            | Self::InvalidArgument(_)
            | Self::InvalidEvent(_) => ErrorKind::InvalidInput,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Json(_) | Self::Network(_) | Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Convenience type alias for Results in usagemeter
pub type Result<T> = std::result::Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_display() {
        let error = MeterError::InvalidGranularity("hour".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid granularity: 'hour'. Expected one of day, week, month, year"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let meter_error: MeterError = io_error.into();
        assert!(matches!(meter_error, MeterError::Io(_)));
        assert_eq!(meter_error.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_error_kinds() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            MeterError::InvalidDateRange { start, end }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            MeterError::Storage("down".into()).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            MeterError::Timeout(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
    }
}
