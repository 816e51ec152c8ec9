//! Common test utilities and helpers for usagemeter tests
//!
//! Event builders, a directory fixture, and store wrappers that count or
//! fail reads so tests can assert on how the facade talks to storage.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use usagemeter::{
    aggregation::Aggregator,
    config::MeterConfig,
    error::{MeterError, Result},
    filters::UsageFilter,
    pricing::{PricingResolver, PricingTable},
    queries::UsageQueries,
    scope::{ScopeResolver, StaticDirectory},
    store::InMemoryUsageStore,
    types::{EventId, NewUsageEvent, UsageEvent, UsageEventInput},
};
use usagemeter_core::store::{EventStream, UsageStore};

/// Models used across tests; all of them have an exact pricing entry
pub const TEST_MODELS: &[(&str, &str)] = &[
    ("gpt-4o", "openai"),
    ("gpt-4o-mini", "openai"),
    ("claude-3-5-sonnet", "anthropic"),
    ("claude-3-haiku", "anthropic"),
];

/// Directory with one admin, two companies, and display names
pub const DIRECTORY_JSON: &str = r#"{
    "admins": ["root"],
    "scopes": {
        "acme": ["alice", "bob"],
        "globex": ["carol"],
        "empty-co": []
    },
    "principals": {
        "alice": "Alice Doe",
        "bob": "Bob Roe",
        "carol": "Carol Poe"
    },
    "projects": {
        "web": "Website relaunch"
    }
}"#;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

/// Builder for stored test events
pub struct UsageEventBuilder {
    principal: String,
    project: Option<String>,
    model: String,
    provider: String,
    input_tokens: u64,
    output_tokens: u64,
    context: Option<String>,
    created_at: DateTime<Utc>,
}

impl UsageEventBuilder {
    pub fn new(principal: &str) -> Self {
        Self {
            principal: principal.to_string(),
            project: None,
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            input_tokens: 100,
            output_tokens: 50,
            context: None,
            created_at: base_time(),
        }
    }

    pub fn model(mut self, model: &str, provider: &str) -> Self {
        self.model = model.to_string();
        self.provider = provider.to_string();
        self
    }

    pub fn project(mut self, project: &str) -> Self {
        self.project = Some(project.to_string());
        self
    }

    pub fn tokens(mut self, input: u64, output: u64) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn minutes_after_base(self, minutes: i64) -> Self {
        self.at(base_time() + Duration::minutes(minutes))
    }

    pub fn input(&self) -> UsageEventInput {
        let mut input = UsageEventInput::new(&self.principal, &self.model, &self.provider)
            .with_tokens(self.input_tokens, self.output_tokens);
        if let Some(project) = &self.project {
            input = input.with_project(project);
        }
        if let Some(context) = &self.context {
            input = input.with_context(context);
        }
        input
    }

    pub fn build(self) -> UsageEvent {
        let created_at = self.created_at;
        self.input()
            .validate()
            .unwrap()
            .into_event(EventId::new_v4(), created_at)
    }
}

/// `count` events for `principal`, one minute apart, cycling through models
pub fn events_for(principal: &str, count: usize) -> Vec<UsageEvent> {
    (0..count)
        .map(|i| {
            let (model, provider) = TEST_MODELS[i % TEST_MODELS.len()];
            UsageEventBuilder::new(principal)
                .model(model, provider)
                .tokens(1_000 * (i as u64 + 1), 500)
                .minutes_after_base(i as i64)
                .build()
        })
        .collect()
}

pub fn directory() -> Arc<StaticDirectory> {
    Arc::new(StaticDirectory::from_json_str(DIRECTORY_JSON).unwrap())
}

pub fn pricing() -> PricingResolver {
    PricingResolver::new(Arc::new(PricingTable::embedded().unwrap()))
}

/// Facade over an arbitrary store with the fixture directory
pub fn queries_over(store: Arc<dyn UsageStore>, config: MeterConfig) -> UsageQueries {
    let directory = directory();
    UsageQueries::new(
        Aggregator::new(store, pricing()),
        ScopeResolver::new(directory.clone()),
        directory,
        config,
    )
}

pub fn queries_with(events: Vec<UsageEvent>) -> UsageQueries {
    queries_over(
        Arc::new(InMemoryUsageStore::with_events(events)),
        MeterConfig::default(),
    )
}

/// Wraps the in-memory store and counts every read
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: InMemoryUsageStore,
    scans: AtomicUsize,
    pages: AtomicUsize,
    counts: AtomicUsize,
    filters: std::sync::Mutex<Vec<UsageFilter>>,
}

impl CountingStore {
    pub fn with_events(events: Vec<UsageEvent>) -> Self {
        Self {
            inner: InMemoryUsageStore::with_events(events),
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
            + self.pages.load(Ordering::SeqCst)
            + self.counts.load(Ordering::SeqCst)
    }

    /// Every filter the store was queried with
    pub fn seen_filters(&self) -> Vec<UsageFilter> {
        self.filters.lock().unwrap().clone()
    }

    fn observe(&self, filter: &UsageFilter) {
        self.filters.lock().unwrap().push(filter.clone());
    }
}

#[async_trait]
impl UsageStore for CountingStore {
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent> {
        self.inner.insert(event).await
    }

    fn scan<'a>(&'a self, filter: &'a UsageFilter) -> EventStream<'a> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.observe(filter);
        self.inner.scan(filter)
    }

    async fn page(
        &self,
        filter: &UsageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageEvent>> {
        self.pages.fetch_add(1, Ordering::SeqCst);
        self.observe(filter);
        self.inner.page(filter, limit, offset).await
    }

    async fn count(&self, filter: &UsageFilter) -> Result<u64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.observe(filter);
        self.inner.count(filter).await
    }
}

/// A store whose every operation fails
#[derive(Debug, Default)]
pub struct FailingStore {
    pub inserts: AtomicUsize,
}

#[async_trait]
impl UsageStore for FailingStore {
    async fn insert(&self, _event: NewUsageEvent) -> Result<UsageEvent> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(MeterError::Storage("connection refused".to_string()))
    }

    fn scan<'a>(&'a self, _filter: &'a UsageFilter) -> EventStream<'a> {
        futures::stream::once(async { Err(MeterError::Storage("connection refused".to_string())) })
            .boxed()
    }

    async fn page(
        &self,
        _filter: &UsageFilter,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<UsageEvent>> {
        Err(MeterError::Storage("connection refused".to_string()))
    }

    async fn count(&self, _filter: &UsageFilter) -> Result<u64> {
        Err(MeterError::Storage("connection refused".to_string()))
    }
}

/// A store that answers only after `delay`
#[derive(Debug)]
pub struct SlowStore {
    pub inner: InMemoryUsageStore,
    pub delay: std::time::Duration,
}

#[async_trait]
impl UsageStore for SlowStore {
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent> {
        self.inner.insert(event).await
    }

    fn scan<'a>(&'a self, filter: &'a UsageFilter) -> EventStream<'a> {
        Box::pin(async_stream::stream! {
            tokio::time::sleep(self.delay).await;
            let mut events = self.inner.scan(filter);
            while let Some(event) = events.next().await {
                yield event;
            }
        })
    }

    async fn page(
        &self,
        filter: &UsageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageEvent>> {
        tokio::time::sleep(self.delay).await;
        self.inner.page(filter, limit, offset).await
    }

    async fn count(&self, filter: &UsageFilter) -> Result<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.count(filter).await
    }
}

/// Captures formatted log output for the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a `warn`-level subscriber writing into this buffer until the
    /// guard is dropped
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let buffer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || buffer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Assert two costs agree to within floating point noise
pub fn assert_cost_eq(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "cost {actual} != expected {expected}"
    );
}
