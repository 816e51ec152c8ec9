//! Request parameter parsing
//!
//! [`UsageQueryParams`] is the raw, string-typed parameter set the boundary
//! layer receives. [`UsageQueryParams::into_query`] validates it once and
//! produces the typed [`DetailedQuery`] every sub-query shares.

use crate::config::MeterConfig;
use crate::error::{MeterError, Result};
use crate::filters::{Pagination, UsageFilter};
use crate::granularity::Granularity;
use crate::queries::DetailedQuery;
use crate::types::{ModelName, PrincipalId, ProjectId};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Raw detailed-view parameters, camelCase on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQueryParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub granularity: Option<String>,
    /// Global-detailed variant only: restrict to these principals
    #[serde(default)]
    pub principal_ids: Option<Vec<String>>,
}

impl UsageQueryParams {
    /// Validate into a typed query.
    ///
    /// Dates accept RFC 3339 timestamps or plain `YYYY-MM-DD`. A plain end
    /// date covers the whole day. `limit` is clamped to the configured
    /// maximum; zero means the default page size.
    pub fn into_query(self, config: &MeterConfig) -> Result<DetailedQuery> {
        let start = self
            .start_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date_bound(s, false))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date_bound(s, true))
            .transpose()?;

        // An empty `principalIds` list requests no principal filter
        let principals: Vec<PrincipalId> = self
            .principal_ids
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .map(PrincipalId::new)
            .collect();
        let mut filter = if principals.is_empty() {
            UsageFilter::new()
        } else {
            UsageFilter::for_principals(principals)
        }
        .with_date_range(start, end)?;

        if let Some(project) = self.project_id.filter(|p| !p.trim().is_empty()) {
            filter = filter.with_project(ProjectId::new(project));
        }
        if let Some(model) = self.model.filter(|m| !m.trim().is_empty()) {
            filter = filter.with_model(ModelName::new(model));
        }

        let granularity = match self.granularity.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<Granularity>()?,
            _ => Granularity::default(),
        };

        let limit = match self.limit {
            None | Some(0) => config.default_page_limit,
            Some(limit) => limit.min(config.max_page_limit),
        };

        Ok(DetailedQuery {
            filter,
            pagination: Pagination::new(limit, self.offset.unwrap_or(0)),
            granularity,
        })
    }
}

/// Parse a date bound; a date-only end bound is extended to the last
/// millisecond of that day
pub fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        MeterError::InvalidDate(format!(
            "'{raw}'. Expected YYYY-MM-DD or an RFC 3339 timestamp"
        ))
    })?;
    let start = date.and_time(NaiveTime::MIN).and_utc();
    if end_of_day {
        Ok(start + TimeDelta::days(1) - TimeDelta::milliseconds(1))
    } else {
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let query = UsageQueryParams::default()
            .into_query(&MeterConfig::default())
            .unwrap();
        assert_eq!(query.filter, UsageFilter::new());
        assert_eq!(query.pagination, Pagination::new(50, 0));
        assert_eq!(query.granularity, Granularity::Day);
    }

    #[test]
    fn test_date_only_end_is_inclusive() {
        let end = parse_date_bound("2024-01-31", true).unwrap();
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap() + TimeDelta::milliseconds(999)
        );
        let start = parse_date_bound("2024-01-01", false).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rfc3339_is_kept_exact() {
        let ts = parse_date_bound("2024-01-31T10:00:00+02:00", true).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 31, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_inputs_are_surfaced() {
        let config = MeterConfig::default();

        let bad_date = UsageQueryParams {
            start_date: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_date.into_query(&config),
            Err(MeterError::InvalidDate(_))
        ));

        let reversed = UsageQueryParams {
            start_date: Some("2024-02-01".into()),
            end_date: Some("2024-01-01".into()),
            ..Default::default()
        };
        assert!(matches!(
            reversed.into_query(&config),
            Err(MeterError::InvalidDateRange { .. })
        ));

        let bad_granularity = UsageQueryParams {
            granularity: Some("hour".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_granularity.into_query(&config),
            Err(MeterError::InvalidGranularity(_))
        ));
    }

    #[test]
    fn test_wire_format_and_clamping() {
        let params: UsageQueryParams = serde_json::from_str(
            r#"{"projectId":"web","model":"gpt-4o","limit":10000,"offset":5,
                "granularity":"week","principalIds":["a","b"]}"#,
        )
        .unwrap();
        let query = params.into_query(&MeterConfig::default()).unwrap();

        assert_eq!(query.pagination, Pagination::new(500, 5));
        assert_eq!(query.granularity, Granularity::Week);
        assert_eq!(query.filter.project(), Some(&ProjectId::new("web")));
        assert_eq!(query.filter.model(), Some(&ModelName::new("gpt-4o")));
        assert!(query.filter.principals().contains(&PrincipalId::new("a")));
        assert!(!query.filter.principals().contains(&PrincipalId::new("c")));
    }
}
