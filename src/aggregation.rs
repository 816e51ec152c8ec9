//! Aggregation module for summarizing usage events
//!
//! The [`Aggregator`] builds grouped, cost-annotated views over the events a
//! [`UsageFilter`] selects: by model, by project, by time bucket, and by
//! principal, plus a raw newest-first listing.
//!
//! Every grouped view is priced the same way. Events are first summed per
//! (group key, model, provider), each of those cells is priced with its own
//! model's rates, and only then are cells folded into the requested group.
//! Summing tokens across models before pricing would misprice any group that
//! mixes models.
//!
//! # Examples
//!
//! ```no_run
//! use usagemeter::aggregation::Aggregator;
//! use usagemeter::filters::UsageFilter;
//! use usagemeter::pricing::{PricingResolver, PricingTable};
//! use usagemeter::store::InMemoryUsageStore;
//! use usagemeter::types::PrincipalId;
//! use std::sync::Arc;
//!
//! # async fn example() -> usagemeter::Result<()> {
//! let store = Arc::new(InMemoryUsageStore::new());
//! let pricing = PricingResolver::new(Arc::new(PricingTable::embedded()?));
//! let aggregator = Aggregator::new(store, pricing);
//!
//! let filter = UsageFilter::for_principal(PrincipalId::new("user-1"));
//! let by_model = aggregator.group_by_model(&filter).await?;
//! let by_project = aggregator.group_by_project(&filter).await?;
//! # Ok(())
//! # }
//! ```

use crate::aggregation_types::{
    BucketUsage, EventPage, ModelUsage, PrincipalUsage, ProjectUsage, TimeModelUsage, TimeSeries,
    UsageLogEntry,
};
use crate::error::Result;
use crate::filters::{Pagination, UsageFilter};
use crate::granularity::Granularity;
use crate::pricing::{PriceMatch, PricingResolver};
use crate::types::{ModelName, PrincipalId, ProjectId, TokenCounts, UsageEvent};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use usagemeter_core::store::UsageStore;

/// Running sums for one (group, model, provider) cell
#[derive(Debug, Clone, Default)]
struct Accumulator {
    tokens: TokenCounts,
    request_count: u64,
    first_used: Option<DateTime<Utc>>,
    last_used: Option<DateTime<Utc>>,
}

impl Accumulator {
    fn add(&mut self, event: &UsageEvent) {
        self.tokens += event.tokens;
        self.request_count += 1;
        self.first_used = Some(match self.first_used {
            Some(first) => first.min(event.created_at),
            None => event.created_at,
        });
        self.last_used = Some(match self.last_used {
            Some(last) => last.max(event.created_at),
            None => event.created_at,
        });
    }
}

type CellKey<K> = (K, ModelName, String);

/// Main aggregation engine
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn UsageStore>,
    pricing: PricingResolver,
}

impl Aggregator {
    pub fn new(store: Arc<dyn UsageStore>, pricing: PricingResolver) -> Self {
        Self { store, pricing }
    }

    /// Scan once and sum events per (key, model, provider)
    async fn cells<K, F>(
        &self,
        filter: &UsageFilter,
        key: F,
    ) -> Result<BTreeMap<CellKey<K>, Accumulator>>
    where
        K: Ord,
        F: Fn(&UsageEvent) -> K,
    {
        let mut cells: BTreeMap<CellKey<K>, Accumulator> = BTreeMap::new();
        if filter.is_unsatisfiable() {
            return Ok(cells);
        }

        let mut scanned = 0usize;
        let mut events = self.store.scan(filter);
        while let Some(event) = events.next().await {
            let event = event?;
            scanned += 1;
            cells
                .entry((key(&event), event.model.clone(), event.provider.clone()))
                .or_default()
                .add(&event);
        }

        debug!("Scanned {} events into {} cells", scanned, cells.len());
        Ok(cells)
    }

    fn price(&self, model: &ModelName, tokens: &TokenCounts) -> (f64, PriceMatch) {
        let (pricing, matched) = self.pricing.resolve(model.as_str());
        let cost = PricingResolver::calculate_from_pricing(
            tokens.input_tokens,
            tokens.output_tokens,
            &pricing,
        );
        (cost, matched)
    }

    /// One row per distinct (model, provider)
    pub async fn group_by_model(&self, filter: &UsageFilter) -> Result<Vec<ModelUsage>> {
        let cells = self.cells(filter, |_| ()).await?;

        let mut rows: Vec<ModelUsage> = cells
            .into_iter()
            .map(|(((), model, provider), acc)| {
                let (cost, matched) = self.price(&model, &acc.tokens);
                ModelUsage {
                    model,
                    provider,
                    tokens: acc.tokens,
                    request_count: acc.request_count,
                    cost,
                    priced: matched.is_priced(),
                }
            })
            .collect();

        let unpriced = rows.iter().filter(|row| !row.priced).count();
        if unpriced > 0 {
            debug!("{} model groups have no pricing and cost zero", unpriced);
        }

        rows.sort_by(|a, b| {
            b.tokens
                .total_tokens
                .cmp(&a.tokens.total_tokens)
                .then_with(|| a.model.cmp(&b.model))
                .then_with(|| a.provider.cmp(&b.provider))
        });
        Ok(rows)
    }

    /// One row per project, with events lacking a project in their own group
    pub async fn group_by_project(&self, filter: &UsageFilter) -> Result<Vec<ProjectUsage>> {
        let cells = self
            .cells(filter, |event| event.project_id.clone())
            .await?;

        let mut projects: BTreeMap<Option<ProjectId>, ProjectUsage> = BTreeMap::new();
        for ((project_id, model, _provider), acc) in cells {
            let (cost, _) = self.price(&model, &acc.tokens);
            let (Some(first), Some(last)) = (acc.first_used, acc.last_used) else {
                continue;
            };

            let row = projects
                .entry(project_id.clone())
                .or_insert_with(|| ProjectUsage {
                    project_id,
                    project_name: None,
                    tokens: TokenCounts::default(),
                    request_count: 0,
                    cost: 0.0,
                    first_used: first,
                    last_used: last,
                });
            row.tokens += acc.tokens;
            row.request_count += acc.request_count;
            row.cost += cost;
            row.first_used = row.first_used.min(first);
            row.last_used = row.last_used.max(last);
        }

        let mut rows: Vec<ProjectUsage> = projects.into_values().collect();
        rows.sort_by(|a, b| {
            b.tokens
                .total_tokens
                .cmp(&a.tokens.total_tokens)
                .then_with(|| a.project_id.is_none().cmp(&b.project_id.is_none()))
                .then_with(|| a.project_id.cmp(&b.project_id))
        });
        Ok(rows)
    }

    /// Per-(bucket, model) rows plus per-bucket totals
    pub async fn group_by_time_bucket(
        &self,
        filter: &UsageFilter,
        granularity: Granularity,
    ) -> Result<TimeSeries> {
        let cells = self
            .cells(filter, |event| granularity.truncate(event.created_at))
            .await?;

        let mut by_time_by_model = Vec::with_capacity(cells.len());
        let mut buckets: BTreeMap<DateTime<Utc>, BucketUsage> = BTreeMap::new();

        // BTreeMap order is already (bucket asc, model, provider)
        for ((bucket_start, model, provider), acc) in cells {
            let (cost, _) = self.price(&model, &acc.tokens);

            let bucket = buckets.entry(bucket_start).or_insert_with(|| BucketUsage {
                bucket_start,
                tokens: TokenCounts::default(),
                request_count: 0,
                cost: 0.0,
            });
            bucket.tokens += acc.tokens;
            bucket.request_count += acc.request_count;
            bucket.cost += cost;

            by_time_by_model.push(TimeModelUsage {
                bucket_start,
                model,
                provider,
                tokens: acc.tokens,
                request_count: acc.request_count,
                cost,
            });
        }

        Ok(TimeSeries {
            by_date: buckets.into_values().collect(),
            by_time_by_model,
        })
    }

    /// Principals ordered by total tokens, at most `limit` of them
    pub async fn top_principals(
        &self,
        filter: &UsageFilter,
        limit: usize,
    ) -> Result<Vec<PrincipalUsage>> {
        let cells = self
            .cells(filter, |event| event.principal_id.clone())
            .await?;

        let mut principals: BTreeMap<PrincipalId, PrincipalUsage> = BTreeMap::new();
        for ((principal_id, model, _provider), acc) in cells {
            let (cost, _) = self.price(&model, &acc.tokens);
            let row = principals
                .entry(principal_id.clone())
                .or_insert_with(|| PrincipalUsage {
                    principal_id,
                    display_name: None,
                    tokens: TokenCounts::default(),
                    request_count: 0,
                    cost: 0.0,
                });
            row.tokens += acc.tokens;
            row.request_count += acc.request_count;
            row.cost += cost;
        }

        let mut rows: Vec<PrincipalUsage> = principals.into_values().collect();
        rows.sort_by_key(|row| (Reverse(row.tokens.total_tokens), row.principal_id.clone()));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Newest-first page of events, each priced individually.
    ///
    /// Fetches one row past the page to decide `has_more` without a count.
    pub async fn list_events(
        &self,
        filter: &UsageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<EventPage> {
        if filter.is_unsatisfiable() {
            return Ok(EventPage::default());
        }

        let mut events = self
            .store
            .page(filter, limit.saturating_add(1), offset)
            .await?;
        let has_more = events.len() > limit;
        events.truncate(limit);

        Ok(EventPage {
            rows: events.into_iter().map(|event| self.log_entry(event)).collect(),
            has_more,
        })
    }

    /// Newest-first page of events without the look-ahead row
    pub async fn page_events(
        &self,
        filter: &UsageFilter,
        pagination: Pagination,
    ) -> Result<Vec<UsageLogEntry>> {
        if filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }

        let events = self
            .store
            .page(filter, pagination.limit, pagination.offset)
            .await?;
        Ok(events.into_iter().map(|event| self.log_entry(event)).collect())
    }

    /// Number of events matching the filter
    pub async fn count(&self, filter: &UsageFilter) -> Result<u64> {
        if filter.is_unsatisfiable() {
            return Ok(0);
        }
        self.store.count(filter).await
    }

    fn log_entry(&self, event: UsageEvent) -> UsageLogEntry {
        let cost = self.pricing.cost_of_tokens(&event.model, &event.tokens);
        UsageLogEntry {
            id: event.id,
            principal_id: event.principal_id,
            principal_name: None,
            project_id: event.project_id,
            model: event.model,
            provider: event.provider,
            tokens: event.tokens,
            context: event.context,
            created_at: event.created_at,
            cost,
        }
    }
}
