//! Storage collaborator trait
//!
//! This module defines the `UsageStore` trait that every event store backend
//! implements. The metering subsystem only appends events and reads them back
//! through a [`UsageFilter`]; schema and persistence layout belong to the backend.

use crate::error::Result;
use crate::filters::UsageFilter;
use crate::types::{NewUsageEvent, UsageEvent};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Stream of events matching a filter
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<UsageEvent>> + Send + 'a>>;

/// Append-mostly store of usage events.
///
/// Reads never mutate, so any number of scans may run concurrently with
/// each other and with inserts.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Persist one event, assigning its id and creation time.
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent>;

    /// Stream every event matching `filter`, in no particular order.
    fn scan<'a>(&'a self, filter: &'a UsageFilter) -> EventStream<'a>;

    /// Matching events newest first, skipping `offset` and returning at most `limit`.
    async fn page(&self, filter: &UsageFilter, limit: usize, offset: usize)
    -> Result<Vec<UsageEvent>>;

    /// Number of events matching `filter`.
    async fn count(&self, filter: &UsageFilter) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, PrincipalId, UsageEventInput};
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use std::sync::Mutex;

    /// Smallest possible backend, to check the trait works behind `dyn`
    #[derive(Default)]
    struct VecStore(Mutex<Vec<UsageEvent>>);

    #[async_trait]
    impl UsageStore for VecStore {
        async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent> {
            let stored = event.into_event(
                EventId::new_v4(),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            );
            self.0.lock().unwrap().push(stored.clone());
            Ok(stored)
        }

        fn scan<'a>(&'a self, filter: &'a UsageFilter) -> EventStream<'a> {
            let rows: Vec<_> = self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .map(Ok)
                .collect();
            Box::pin(futures::stream::iter(rows))
        }

        async fn page(
            &self,
            filter: &UsageFilter,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<UsageEvent>> {
            let rows = self.0.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .filter(|e| filter.matches(e))
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn count(&self, filter: &UsageFilter) -> Result<u64> {
            Ok(self.0.lock().unwrap().iter().filter(|e| filter.matches(e)).count() as u64)
        }
    }

    #[test]
    fn test_store_behind_trait_object() {
        let store: Box<dyn UsageStore> = Box::new(VecStore::default());
        tokio_test::block_on(async {
            for principal in ["u1", "u2", "u1"] {
                let event = UsageEventInput::new(principal, "gpt-4o", "openai")
                    .validate()
                    .unwrap();
                store.insert(event).await.unwrap();
            }

            let filter = UsageFilter::for_principal(PrincipalId::new("u1"));
            assert_eq!(store.count(&filter).await.unwrap(), 2);
            assert_eq!(store.scan(&filter).count().await, 2);
            assert_eq!(store.page(&filter, 1, 1).await.unwrap().len(), 1);
        });
    }
}
