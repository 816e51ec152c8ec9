//! Aggregation data types for usagemeter
//!
//! Pure data structures produced by the aggregation engine. These types
//! have no dependencies on pricing or storage.

use crate::types::{EventId, ModelName, PrincipalId, ProjectId, TokenCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage for one distinct (model, provider) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub model: ModelName,
    pub provider: String,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub request_count: u64,
    /// Cost in currency units, priced from the group's summed tokens
    pub cost: f64,
    /// False when no pricing entry matched and the cost is zero by default
    pub priced: bool,
}

/// Usage for one project; `project_id: None` is the "no project" group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUsage {
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub request_count: u64,
    /// Sum of per-model costs within the project
    pub cost: f64,
    pub first_used: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Usage for one (bucket, model, provider) cell of the time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeModelUsage {
    pub bucket_start: DateTime<Utc>,
    pub model: ModelName,
    pub provider: String,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub request_count: u64,
    pub cost: f64,
}

/// Usage for one time bucket across all models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketUsage {
    pub bucket_start: DateTime<Utc>,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub request_count: u64,
    /// Sum of the bucket's per-model costs
    pub cost: f64,
}

/// Time series output: per-bucket totals plus the per-model breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub by_date: Vec<BucketUsage>,
    pub by_time_by_model: Vec<TimeModelUsage>,
}

/// One raw event annotated with its individual cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    pub id: EventId,
    pub principal_id: PrincipalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
    pub project_id: Option<ProjectId>,
    pub model: ModelName,
    pub provider: String,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cost: f64,
}

/// A newest-first page of log entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub rows: Vec<UsageLogEntry>,
    pub has_more: bool,
}

/// Usage attributed to one principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalUsage {
    pub principal_id: PrincipalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub request_count: u64,
    pub cost: f64,
}

/// Grand totals over a set of model rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub requests: u64,
    pub cost: f64,
}

impl Totals {
    pub fn from_models(models: &[ModelUsage]) -> Self {
        models.iter().fold(Self::default(), |totals, row| {
            totals.add_row(&row.tokens, row.request_count, row.cost)
        })
    }

    pub fn from_projects(projects: &[ProjectUsage]) -> Self {
        projects.iter().fold(Self::default(), |totals, row| {
            totals.add_row(&row.tokens, row.request_count, row.cost)
        })
    }

    // Token sums saturate like `TokenCounts`
    fn add_row(mut self, tokens: &TokenCounts, requests: u64, cost: f64) -> Self {
        self.input = self.input.saturating_add(tokens.input_tokens);
        self.output = self.output.saturating_add(tokens.output_tokens);
        self.total = self.total.saturating_add(tokens.total_tokens);
        self.requests = self.requests.saturating_add(requests);
        self.cost += cost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_row(model: &str, input: u64, output: u64, requests: u64, cost: f64) -> ModelUsage {
        ModelUsage {
            model: ModelName::new(model),
            provider: "openai".to_string(),
            tokens: TokenCounts::new(input, output),
            request_count: requests,
            cost,
            priced: true,
        }
    }

    #[test]
    fn test_totals_from_models() {
        let rows = vec![
            model_row("gpt-4o", 1000, 2000, 1, 0.0225),
            model_row("gpt-4", 500, 500, 3, 0.045),
        ];
        let totals = Totals::from_models(&rows);
        assert_eq!(totals.input, 1500);
        assert_eq!(totals.output, 2500);
        assert_eq!(totals.total, 4000);
        assert_eq!(totals.requests, 4);
        assert!((totals.cost - 0.0675).abs() < 1e-12);
    }

    #[test]
    fn test_totals_saturate() {
        let rows = vec![
            model_row("gpt-4o", u64::MAX / 2, 0, 1, 1.0),
            model_row("gpt-4", u64::MAX / 2, 0, 1, 1.0),
            model_row("gpt-4o-mini", u64::MAX / 2, 0, 1, 1.0),
        ];
        let totals = Totals::from_models(&rows);
        assert_eq!(totals.input, u64::MAX);
        assert_eq!(totals.total, u64::MAX);
        assert_eq!(totals.requests, 3);
    }

    #[test]
    fn test_totals_from_projects() {
        let ts = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 1, 0, 0, 0).unwrap();
        let project = |id: Option<&str>, input: u64, cost: f64| ProjectUsage {
            project_id: id.map(ProjectId::new),
            project_name: None,
            tokens: TokenCounts::new(input, 10),
            request_count: 2,
            cost,
            first_used: ts,
            last_used: ts,
        };
        let totals = Totals::from_projects(&[project(Some("web"), 100, 0.25), project(None, 50, 0.5)]);
        assert_eq!(totals.input, 150);
        assert_eq!(totals.output, 20);
        assert_eq!(totals.total, 170);
        assert_eq!(totals.requests, 4);
        assert!((totals.cost - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_totals_shape() {
        let json = serde_json::to_value(Totals::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"input": 0, "output": 0, "total": 0, "requests": 0, "cost": 0.0})
        );
    }

    #[test]
    fn test_model_usage_serializes_flat_tokens() {
        let json = serde_json::to_value(model_row("gpt-4o", 1, 2, 1, 0.5)).unwrap();
        assert_eq!(json["inputTokens"], 1);
        assert_eq!(json["totalTokens"], 3);
        assert_eq!(json["requestCount"], 1);
    }
}
