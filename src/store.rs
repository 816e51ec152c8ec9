//! In-memory event store
//!
//! Reference [`UsageStore`] backend used by the CLI and the tests. Each read
//! takes one snapshot of the matching rows under a read lock and releases the
//! lock before yielding, so a long aggregation never holds up the writer.

use crate::error::{MeterError, Result};
use crate::filters::UsageFilter;
use crate::types::{EventId, NewUsageEvent, UsageEvent};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::Stream;
use std::cmp::Reverse;
use tokio::sync::RwLock;
use tracing::debug;
use usagemeter_core::store::{EventStream, UsageStore};

/// Append-only vector of events behind an async read/write lock
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    events: RwLock<Vec<UsageEvent>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already-stored events
    pub fn with_events(events: Vec<UsageEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    /// Collect a stream of stored events into a new store
    pub async fn from_stream(events: impl Stream<Item = Result<UsageEvent>>) -> Result<Self> {
        use futures::StreamExt;

        let mut loaded = Vec::new();
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            loaded.push(event?);
        }
        debug!("Loaded {} usage events into memory", loaded.len());
        Ok(Self::with_events(loaded))
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Copy of every stored event, oldest first
    pub async fn snapshot(&self) -> Vec<UsageEvent> {
        self.events.read().await.clone()
    }

    async fn matching(&self, filter: &UsageFilter) -> Vec<UsageEvent> {
        let events = self.events.read().await;
        events
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent> {
        let stored = event.into_event(EventId::new_v4(), Utc::now());
        self.events.write().await.push(stored.clone());
        Ok(stored)
    }

    fn scan<'a>(&'a self, filter: &'a UsageFilter) -> EventStream<'a> {
        Box::pin(async_stream::stream! {
            for event in self.matching(filter).await {
                yield Ok::<_, MeterError>(event);
            }
        })
    }

    async fn page(
        &self,
        filter: &UsageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageEvent>> {
        let mut rows = self.matching(filter).await;
        rows.sort_by_key(|event| (Reverse(event.created_at), Reverse(event.id)));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &UsageFilter) -> Result<u64> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| filter.matches(event)).count() as u64)
    }
}
