//! Read operations exposed to the boundary layer
//!
//! [`UsageQueries`] composes scope resolution and aggregation into the
//! summary and detailed envelopes. Sub-queries of one operation share a
//! single [`UsageFilter`] and run concurrently; if any of them fails, or the
//! configured deadline passes, the whole operation fails and no partial
//! envelope is returned.
//!
//! Authorization happens before this layer. The one check done here is the
//! member restriction of detailed views, which is intersected into the
//! filter before any sub-query runs.

use crate::aggregation::Aggregator;
use crate::aggregation_types::{PrincipalUsage, ProjectUsage, UsageLogEntry};
use crate::config::MeterConfig;
use crate::error::{MeterError, Result};
use crate::filters::{Pagination, UsageFilter};
use crate::granularity::Granularity;
use crate::response::{DetailedBuilder, DetailedUsageResponse, SummaryBuilder, UsageSummaryResponse};
use crate::scope::{ProjectDirectory, ScopeResolver};
use crate::types::{PrincipalId, ProjectId, ScopeId};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Parameters of a detailed view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailedQuery {
    pub filter: UsageFilter,
    pub pagination: Pagination,
    pub granularity: Granularity,
}

/// The query facade
#[derive(Clone)]
pub struct UsageQueries {
    aggregator: Aggregator,
    scopes: ScopeResolver,
    projects: Arc<dyn ProjectDirectory>,
    config: MeterConfig,
}

impl UsageQueries {
    pub fn new(
        aggregator: Aggregator,
        scopes: ScopeResolver,
        projects: Arc<dyn ProjectDirectory>,
        config: MeterConfig,
    ) -> Self {
        Self {
            aggregator,
            scopes,
            projects,
            config,
        }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    async fn with_deadline<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.query_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| MeterError::Timeout(limit))?,
            None => operation.await,
        }
    }

    /// Usage of a single principal by model, with their latest events
    pub async fn self_usage(&self, principal: &PrincipalId) -> Result<UsageSummaryResponse> {
        self.with_deadline(async {
            let filter = UsageFilter::for_principal(principal.clone());
            let (models, recent) = futures::try_join!(
                self.aggregator.group_by_model(&filter),
                self.aggregator
                    .list_events(&filter, self.config.recent_log_limit, 0),
            )?;

            Ok(SummaryBuilder::new()
                .summary(models)
                .recent_logs(recent.rows)
                .build())
        })
        .await
    }

    /// Usage of every member of a company. An empty scope reads nothing.
    pub async fn scope_usage(&self, scope: &ScopeId) -> Result<UsageSummaryResponse> {
        self.with_deadline(async {
            let members = self.scopes.members_of(scope).await?;
            if members.is_empty() {
                debug!("Scope {} has no members, returning zero usage", scope);
                return Ok(UsageSummaryResponse::empty());
            }

            let filter = UsageFilter::for_principals(members);
            let (models, recent) = futures::try_join!(
                self.aggregator.group_by_model(&filter),
                self.aggregator
                    .list_events(&filter, self.config.recent_log_limit, 0),
            )?;
            let logs = self.name_logs(recent.rows).await?;

            Ok(SummaryBuilder::new().summary(models).recent_logs(logs).build())
        })
        .await
    }

    /// Unfiltered usage by model, the heaviest principals, and the latest events
    pub async fn global_summary(&self) -> Result<UsageSummaryResponse> {
        self.with_deadline(async {
            let filter = UsageFilter::new();
            let (models, top, recent) = futures::try_join!(
                self.aggregator.group_by_model(&filter),
                self.aggregator
                    .top_principals(&filter, self.config.top_principals),
                self.aggregator
                    .list_events(&filter, self.config.recent_log_limit, 0),
            )?;
            let top = self.name_principals(top).await?;
            let logs = self.name_logs(recent.rows).await?;

            Ok(SummaryBuilder::new()
                .summary(models)
                .top_principals(top)
                .recent_logs(logs)
                .build())
        })
        .await
    }

    /// Project, time series, and paginated log views under one filter.
    ///
    /// `restriction` narrows the filter's principals before anything runs.
    /// When the narrowed set is empty, no store query is issued.
    pub async fn detailed_usage(
        &self,
        query: DetailedQuery,
        restriction: Option<&BTreeSet<PrincipalId>>,
    ) -> Result<DetailedUsageResponse> {
        self.with_deadline(self.run_detailed(query, restriction))
            .await
    }

    /// Detailed view over the members of a company
    pub async fn scope_detailed_usage(
        &self,
        scope: &ScopeId,
        query: DetailedQuery,
    ) -> Result<DetailedUsageResponse> {
        self.with_deadline(async {
            let members = self.scopes.members_of(scope).await?;
            self.run_detailed(query, Some(&members)).await
        })
        .await
    }

    /// Detailed view restricted to whatever `viewer` is allowed to see
    pub async fn detailed_usage_for(
        &self,
        viewer: &PrincipalId,
        query: DetailedQuery,
    ) -> Result<DetailedUsageResponse> {
        self.with_deadline(async {
            let access = self.scopes.access_for(viewer).await?;
            debug!("Detailed usage for {} with access {:?}", viewer, access);
            let restriction = self.scopes.visible_principals(&access).await?;
            self.run_detailed(query, restriction.as_ref()).await
        })
        .await
    }

    async fn run_detailed(
        &self,
        query: DetailedQuery,
        restriction: Option<&BTreeSet<PrincipalId>>,
    ) -> Result<DetailedUsageResponse> {
        let DetailedQuery {
            mut filter,
            pagination,
            granularity,
        } = query;
        if let Some(members) = restriction {
            filter = filter.restricted_to(members);
        }
        if filter.is_unsatisfiable() {
            debug!("Detailed usage filter matches no principal, returning zero usage");
            return Ok(DetailedUsageResponse::empty(pagination));
        }

        let (projects, series, logs, total) = futures::try_join!(
            self.aggregator.group_by_project(&filter),
            self.aggregator.group_by_time_bucket(&filter, granularity),
            self.aggregator.page_events(&filter, pagination),
            self.aggregator.count(&filter),
        )?;
        debug!(
            "Detailed usage: {} projects, {} buckets, {} of {} events",
            projects.len(),
            series.by_date.len(),
            logs.len(),
            total
        );

        let projects = self.name_projects(projects).await?;
        let logs = self.name_logs(logs).await?;

        Ok(DetailedBuilder::new(pagination)
            .projects(projects)
            .series(series)
            .logs(logs)
            .total(total)
            .build())
    }

    async fn name_logs(&self, mut logs: Vec<UsageLogEntry>) -> Result<Vec<UsageLogEntry>> {
        let ids: BTreeSet<PrincipalId> = logs.iter().map(|log| log.principal_id.clone()).collect();
        let names = self.scopes.display_names(&ids).await?;
        for log in &mut logs {
            log.principal_name = names.get(&log.principal_id).cloned();
        }
        Ok(logs)
    }

    async fn name_principals(&self, mut rows: Vec<PrincipalUsage>) -> Result<Vec<PrincipalUsage>> {
        let ids: BTreeSet<PrincipalId> = rows.iter().map(|row| row.principal_id.clone()).collect();
        let mut names = self.scopes.display_names(&ids).await?;
        for row in &mut rows {
            row.display_name = names.remove(&row.principal_id);
        }
        Ok(rows)
    }

    async fn name_projects(&self, mut rows: Vec<ProjectUsage>) -> Result<Vec<ProjectUsage>> {
        let ids: BTreeSet<ProjectId> = rows.iter().filter_map(|row| row.project_id.clone()).collect();
        let mut names: HashMap<ProjectId, String> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.projects.project_names(&ids).await?
        };
        for row in &mut rows {
            row.project_name = row.project_id.as_ref().and_then(|id| names.remove(id));
        }
        Ok(rows)
    }
}
