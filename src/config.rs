//! Runtime configuration for the metering subsystem

use crate::error::{MeterError, Result};
use std::time::Duration;

/// Tunables shared by the recorder and the query facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterConfig {
    /// Bounded recorder queue size; events beyond it are dropped
    pub recorder_capacity: usize,
    /// Rows in the `recentLogs` list of summary views
    pub recent_log_limit: usize,
    /// Rows in the global summary's top principals list
    pub top_principals: usize,
    /// Page size when the caller gives none
    pub default_page_limit: usize,
    /// Upper bound a caller-supplied page size is clamped to
    pub max_page_limit: usize,
    /// Deadline for one facade operation; `None` waits indefinitely
    pub query_timeout: Option<Duration>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            recorder_capacity: 10_000,
            recent_log_limit: 20,
            top_principals: 10,
            default_page_limit: 50,
            max_page_limit: 500,
            query_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl MeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recorder_capacity == 0 {
            return Err(MeterError::Config(
                "recorder capacity must be at least 1".to_string(),
            ));
        }
        if self.default_page_limit == 0 {
            return Err(MeterError::Config(
                "default page limit must be at least 1".to_string(),
            ));
        }
        if self.max_page_limit < self.default_page_limit {
            return Err(MeterError::Config(format!(
                "max page limit {} is below the default page limit {}",
                self.max_page_limit, self.default_page_limit
            )));
        }
        if self.query_timeout == Some(Duration::ZERO) {
            return Err(MeterError::Config("query timeout must be positive".to_string()));
        }
        Ok(())
    }
}
