//! Response envelopes for the read operations
//!
//! Envelopes are only ever assembled through [`SummaryBuilder`] and
//! [`DetailedBuilder`]. Anything a builder was not given is filled with zero
//! or an empty list, so a principal without usage serializes to the same
//! shape as a busy one.

use crate::aggregation_types::{
    BucketUsage, ModelUsage, PrincipalUsage, ProjectUsage, TimeModelUsage, TimeSeries, Totals,
    UsageLogEntry,
};
use crate::filters::Pagination;
use serde::{Deserialize, Serialize};

/// `{summary, totals, recentLogs}` envelope for self, scope, and global views
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummaryResponse {
    pub summary: Vec<ModelUsage>,
    pub totals: Totals,
    pub recent_logs: Vec<UsageLogEntry>,
    /// Only present on the global summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_principals: Option<Vec<PrincipalUsage>>,
}

impl UsageSummaryResponse {
    /// All-zero envelope
    pub fn empty() -> Self {
        SummaryBuilder::new().build()
    }
}

/// Pagination metadata for the detailed listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Detailed view: project, date, and per-model time series plus a log page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedUsageResponse {
    pub usage_by_project: Vec<ProjectUsage>,
    pub usage_by_date: Vec<BucketUsage>,
    pub usage_by_time_by_model: Vec<TimeModelUsage>,
    pub logs: Vec<UsageLogEntry>,
    pub pagination: PageInfo,
}

impl DetailedUsageResponse {
    /// Zeroed envelope that still echoes the requested page window
    pub fn empty(pagination: Pagination) -> Self {
        DetailedBuilder::new(pagination).build()
    }
}

#[derive(Debug, Default)]
pub struct SummaryBuilder {
    summary: Vec<ModelUsage>,
    recent_logs: Vec<UsageLogEntry>,
    top_principals: Option<Vec<PrincipalUsage>>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(mut self, rows: Vec<ModelUsage>) -> Self {
        self.summary = rows;
        self
    }

    pub fn recent_logs(mut self, rows: Vec<UsageLogEntry>) -> Self {
        self.recent_logs = rows;
        self
    }

    pub fn top_principals(mut self, rows: Vec<PrincipalUsage>) -> Self {
        self.top_principals = Some(rows);
        self
    }

    /// Totals are always derived from the summary rows
    pub fn build(self) -> UsageSummaryResponse {
        UsageSummaryResponse {
            totals: Totals::from_models(&self.summary),
            summary: self.summary,
            recent_logs: self.recent_logs,
            top_principals: self.top_principals,
        }
    }
}

#[derive(Debug)]
pub struct DetailedBuilder {
    pagination: Pagination,
    total: u64,
    usage_by_project: Vec<ProjectUsage>,
    series: TimeSeries,
    logs: Vec<UsageLogEntry>,
}

impl DetailedBuilder {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            pagination,
            total: 0,
            usage_by_project: Vec::new(),
            series: TimeSeries::default(),
            logs: Vec::new(),
        }
    }

    pub fn projects(mut self, rows: Vec<ProjectUsage>) -> Self {
        self.usage_by_project = rows;
        self
    }

    pub fn series(mut self, series: TimeSeries) -> Self {
        self.series = series;
        self
    }

    pub fn logs(mut self, rows: Vec<UsageLogEntry>) -> Self {
        self.logs = rows;
        self
    }

    /// Total number of rows the listing filter matches
    pub fn total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn build(self) -> DetailedUsageResponse {
        DetailedUsageResponse {
            usage_by_project: self.usage_by_project,
            usage_by_date: self.series.by_date,
            usage_by_time_by_model: self.series.by_time_by_model,
            logs: self.logs,
            pagination: PageInfo {
                total: self.total,
                limit: self.pagination.limit,
                offset: self.pagination.offset,
                has_more: self.pagination.has_more(self.total),
            },
        }
    }
}
