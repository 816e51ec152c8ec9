//! Output formatting module for usagemeter
//!
//! This module provides formatters for displaying usage envelopes:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! # Examples
//!
//! ```
//! use usagemeter_core::response::UsageSummaryResponse;
//! use usagemeter_terminal::output::get_formatter;
//!
//! let response = UsageSummaryResponse::empty();
//!
//! // Human-readable table
//! let formatter = get_formatter(false, true);
//! println!("{}", formatter.format_summary("My usage", &response));
//!
//! // Machine-readable JSON
//! let json = get_formatter(true, false).format_summary("My usage", &response);
//! assert!(json.contains("\"recentLogs\""));
//! ```

use chrono::{DateTime, Utc};
use colored::Colorize;
use prettytable::{Cell, Row, Table, format, row};
use usagemeter_core::aggregation_types::{Totals, UsageLogEntry};
use usagemeter_core::granularity::Granularity;
use usagemeter_core::response::{DetailedUsageResponse, UsageSummaryResponse};

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a self, scope, or global summary
    fn format_summary(&self, title: &str, response: &UsageSummaryResponse) -> String;

    /// Format a detailed view; `granularity` controls bucket labels
    fn format_detailed(&self, response: &DetailedUsageResponse, granularity: Granularity)
    -> String;

    /// Format the outcome of a batch of recorded events
    fn format_recorded(&self, written: u64, rejected: u64, dropped: u64) -> String;
}

/// Table formatter for human-readable output
///
/// Numbers get thousands separators and costs are shown with a dollar sign.
/// Unpriced models are highlighted unless `NO_COLOR` is set.
pub struct TableFormatter {
    colored_output: bool,
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            colored_output: std::env::var("NO_COLOR").is_err(),
        }
    }

    /// Formatter that never emits ANSI escapes
    pub fn plain() -> Self {
        Self {
            colored_output: false,
        }
    }

    /// Format a number with thousands separators
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();

        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }

        result.chars().rev().collect()
    }

    /// Costs below a cent still matter for per-call logs, so keep four places
    fn format_currency(amount: f64) -> String {
        format!("${amount:.4}")
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn heading(&self, text: &str) -> String {
        if self.colored_output {
            format!("{}\n", text.bold())
        } else {
            format!("{text}\n")
        }
    }

    fn unpriced_marker(&self) -> String {
        if self.colored_output {
            "unpriced".yellow().to_string()
        } else {
            "unpriced".to_string()
        }
    }

    fn totals_row(totals: &Totals, leading_blanks: usize) -> Row {
        let mut cells = vec![Cell::new("TOTAL").style_spec("b")];
        cells.extend((0..leading_blanks).map(|_| Cell::new("")));
        cells.extend([
            Cell::new(&Self::format_number(totals.input)).style_spec("br"),
            Cell::new(&Self::format_number(totals.output)).style_spec("br"),
            Cell::new(&Self::format_number(totals.total)).style_spec("br"),
            Cell::new(&Self::format_number(totals.requests)).style_spec("br"),
            Cell::new(&Self::format_currency(totals.cost)).style_spec("br"),
        ]);
        Row::new(cells)
    }

    fn logs_table(logs: &[UsageLogEntry]) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Time",
            b -> "Principal",
            b -> "Project",
            b -> "Model",
            b -> "Input",
            b -> "Output",
            b -> "Cost",
            b -> "Context"
        ]);

        for log in logs {
            let principal = log
                .principal_name
                .clone()
                .unwrap_or_else(|| log.principal_id.to_string());
            table.add_row(row![
                Self::format_timestamp(&log.created_at),
                principal,
                log.project_id
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                log.model,
                r -> Self::format_number(log.tokens.input_tokens),
                r -> Self::format_number(log.tokens.output_tokens),
                r -> Self::format_currency(log.cost),
                log.context.as_deref().unwrap_or("")
            ]);
        }
        table
    }
}

impl OutputFormatter for TableFormatter {
    fn format_summary(&self, title: &str, response: &UsageSummaryResponse) -> String {
        let mut output = self.heading(title);

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Model",
            b -> "Provider",
            b -> "Input",
            b -> "Output",
            b -> "Total",
            b -> "Requests",
            b -> "Cost"
        ]);

        for entry in &response.summary {
            let model = if entry.priced {
                entry.model.to_string()
            } else {
                format!("{} ({})", entry.model, self.unpriced_marker())
            };
            table.add_row(row![
                model,
                entry.provider,
                r -> Self::format_number(entry.tokens.input_tokens),
                r -> Self::format_number(entry.tokens.output_tokens),
                r -> Self::format_number(entry.tokens.total_tokens),
                r -> Self::format_number(entry.request_count),
                r -> Self::format_currency(entry.cost)
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 7]));
        table.add_row(Self::totals_row(&response.totals, 1));
        output.push_str(&table.to_string());

        if let Some(top) = &response.top_principals {
            output.push('\n');
            output.push_str(&self.heading("Top principals"));
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
            table.set_titles(row![b -> "Principal", b -> "Total", b -> "Requests", b -> "Cost"]);
            for row in top {
                let name = match &row.display_name {
                    Some(name) => format!("{} ({})", name, row.principal_id),
                    None => row.principal_id.to_string(),
                };
                table.add_row(row![
                    name,
                    r -> Self::format_number(row.tokens.total_tokens),
                    r -> Self::format_number(row.request_count),
                    r -> Self::format_currency(row.cost)
                ]);
            }
            output.push_str(&table.to_string());
        }

        if !response.recent_logs.is_empty() {
            output.push('\n');
            output.push_str(&self.heading("Recent activity"));
            output.push_str(&Self::logs_table(&response.recent_logs).to_string());
        }

        output
    }

    fn format_detailed(
        &self,
        response: &DetailedUsageResponse,
        granularity: Granularity,
    ) -> String {
        let mut output = self.heading("Usage by project");

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Project",
            b -> "First used",
            b -> "Input",
            b -> "Output",
            b -> "Total",
            b -> "Requests",
            b -> "Cost"
        ]);
        for project in &response.usage_by_project {
            let label = match (&project.project_id, &project.project_name) {
                (Some(id), Some(name)) => format!("{name} ({id})"),
                (Some(id), None) => id.to_string(),
                (None, _) => "(no project)".to_string(),
            };
            table.add_row(row![
                label,
                Self::format_timestamp(&project.first_used),
                r -> Self::format_number(project.tokens.input_tokens),
                r -> Self::format_number(project.tokens.output_tokens),
                r -> Self::format_number(project.tokens.total_tokens),
                r -> Self::format_number(project.request_count),
                r -> Self::format_currency(project.cost)
            ]);
        }
        if !response.usage_by_project.is_empty() {
            let totals = Totals::from_projects(&response.usage_by_project);
            table.add_row(Self::totals_row(&totals, 1));
        }
        output.push_str(&table.to_string());

        output.push('\n');
        output.push_str(&self.heading(&format!("Usage by {granularity}")));
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Period", b -> "Model", b -> "Total", b -> "Requests", b -> "Cost"]);
        for bucket in &response.usage_by_date {
            let label = granularity.label(bucket.bucket_start);
            for cell in response
                .usage_by_time_by_model
                .iter()
                .filter(|cell| cell.bucket_start == bucket.bucket_start)
            {
                table.add_row(row![
                    label,
                    cell.model,
                    r -> Self::format_number(cell.tokens.total_tokens),
                    r -> Self::format_number(cell.request_count),
                    r -> Self::format_currency(cell.cost)
                ]);
            }
            table.add_row(row![
                b -> label,
                b -> "all models",
                br -> Self::format_number(bucket.tokens.total_tokens),
                br -> Self::format_number(bucket.request_count),
                br -> Self::format_currency(bucket.cost)
            ]);
        }
        output.push_str(&table.to_string());

        let page = &response.pagination;
        output.push('\n');
        output.push_str(&self.heading(&format!(
            "Events {}-{} of {}",
            if response.logs.is_empty() { 0 } else { page.offset + 1 },
            page.offset + response.logs.len(),
            page.total
        )));
        output.push_str(&Self::logs_table(&response.logs).to_string());
        if page.has_more {
            output.push_str(&format!(
                "More events available, use --offset {}\n",
                page.offset + page.limit
            ));
        }

        output
    }

    fn format_recorded(&self, written: u64, rejected: u64, dropped: u64) -> String {
        let mut output = format!("Recorded {} events", Self::format_number(written));
        if rejected > 0 || dropped > 0 {
            let skipped = format!("{rejected} rejected, {dropped} dropped");
            if self.colored_output {
                output.push_str(&format!(" ({})", skipped.yellow()));
            } else {
                output.push_str(&format!(" ({skipped})"));
            }
        }
        output.push('\n');
        output
    }
}

/// JSON formatter for machine-readable output
///
/// Envelopes are emitted exactly as the read operations return them, in
/// camelCase.
pub struct JsonFormatter;

impl JsonFormatter {
    fn to_json<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_summary(&self, _title: &str, response: &UsageSummaryResponse) -> String {
        Self::to_json(response)
    }

    fn format_detailed(
        &self,
        response: &DetailedUsageResponse,
        _granularity: Granularity,
    ) -> String {
        Self::to_json(response)
    }

    fn format_recorded(&self, written: u64, rejected: u64, dropped: u64) -> String {
        Self::to_json(&serde_json::json!({
            "written": written,
            "rejected": rejected,
            "dropped": dropped,
        }))
    }
}

/// Get appropriate formatter based on JSON flag
///
/// `color` should be false when stdout is not a terminal; tables then never
/// carry ANSI escapes regardless of `NO_COLOR`.
pub fn get_formatter(json: bool, color: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else if color {
        Box::new(TableFormatter::new())
    } else {
        Box::new(TableFormatter::plain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use usagemeter_core::aggregation_types::{
        BucketUsage, ModelUsage, ProjectUsage, TimeModelUsage,
    };
    use usagemeter_core::filters::Pagination;
    use usagemeter_core::response::{DetailedBuilder, SummaryBuilder};
    use usagemeter_core::types::{EventId, ModelName, PrincipalId, ProjectId, TokenCounts};

    fn model_row(model: &str, priced: bool) -> ModelUsage {
        ModelUsage {
            model: ModelName::new(model),
            provider: "openai".to_string(),
            tokens: TokenCounts::new(1500, 2500),
            request_count: 3,
            cost: 0.0315,
            priced,
        }
    }

    fn log_row() -> UsageLogEntry {
        UsageLogEntry {
            id: EventId::new_v4(),
            principal_id: PrincipalId::new("u1"),
            principal_name: Some("Alice".to_string()),
            project_id: None,
            model: ModelName::new("gpt-4o"),
            provider: "openai".to_string(),
            tokens: TokenCounts::new(10, 20),
            context: Some("chat".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            cost: 0.000225,
        }
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(TableFormatter::format_number(1234567), "1,234,567");
        assert_eq!(TableFormatter::format_number(999), "999");
        assert_eq!(TableFormatter::format_number(0), "0");
        assert_eq!(TableFormatter::format_number(1000000000), "1,000,000,000");
    }

    #[test]
    fn test_currency_formatting() {
        assert_eq!(TableFormatter::format_currency(12.345), "$12.3450");
        assert_eq!(TableFormatter::format_currency(0.0), "$0.0000");
        assert_eq!(TableFormatter::format_currency(0.000225), "$0.0002");
    }

    #[test]
    fn test_table_summary() {
        let response = SummaryBuilder::new()
            .summary(vec![model_row("gpt-4o", true), model_row("house-llm", false)])
            .recent_logs(vec![log_row()])
            .build();
        let output = TableFormatter::plain().format_summary("Usage", &response);

        assert!(output.contains("gpt-4o"));
        assert!(output.contains("house-llm (unpriced)"));
        assert!(output.contains("TOTAL"));
        assert!(output.contains("3,000"));
        assert!(output.contains("Alice"));
        assert!(!output.contains("Top principals"));
    }

    #[test]
    fn test_table_detailed() {
        let bucket_start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = usagemeter_core::aggregation_types::TimeSeries {
            by_date: vec![BucketUsage {
                bucket_start,
                tokens: TokenCounts::new(10, 20),
                request_count: 1,
                cost: 0.5,
            }],
            by_time_by_model: vec![TimeModelUsage {
                bucket_start,
                model: ModelName::new("gpt-4o"),
                provider: "openai".to_string(),
                tokens: TokenCounts::new(10, 20),
                request_count: 1,
                cost: 0.5,
            }],
        };
        let response = DetailedBuilder::new(Pagination::new(1, 0))
            .projects(vec![ProjectUsage {
                project_id: Some(ProjectId::new("web")),
                project_name: Some("Website".to_string()),
                tokens: TokenCounts::new(10, 20),
                request_count: 1,
                cost: 0.5,
                first_used: bucket_start,
                last_used: bucket_start,
            }])
            .series(series)
            .logs(vec![log_row()])
            .total(4)
            .build();

        let output = TableFormatter::plain().format_detailed(&response, Granularity::Month);
        assert!(output.contains("Website (web)"));
        assert!(output.contains("TOTAL"));
        assert!(output.contains("2024-01"));
        assert!(output.contains("Events 1-1 of 4"));
        assert!(output.contains("--offset 1"));
    }

    #[test]
    fn test_json_formatter() {
        let response = SummaryBuilder::new()
            .summary(vec![model_row("gpt-4o", true)])
            .build();
        let output = get_formatter(true, false).format_summary("ignored", &response);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["totals"]["requests"], 3);
        assert_eq!(value["summary"][0]["model"], "gpt-4o");

        let recorded: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_recorded(2, 1, 0)).unwrap();
        assert_eq!(recorded["written"], 2);
    }

    #[test]
    fn test_recorded_table() {
        assert_eq!(
            TableFormatter::plain().format_recorded(1200, 0, 0),
            "Recorded 1,200 events\n"
        );
        assert!(
            TableFormatter::plain()
                .format_recorded(1, 2, 3)
                .contains("2 rejected, 3 dropped")
        );
    }
}
