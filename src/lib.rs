//! usagemeter - Usage metering and cost attribution for metered AI-model calls
//!
//! This library provides functionality to:
//! - Record usage events without blocking or failing the metered call
//! - Price token counts with a per-model table and ordered family rules
//! - Aggregate usage by model, project, time bucket, and principal
//! - Serve self, company, and global views over the same event stream
//!
//! # Examples
//!
//! ```no_run
//! use usagemeter::{
//!     aggregation::Aggregator,
//!     config::MeterConfig,
//!     pricing::{PricingResolver, PricingTable},
//!     queries::UsageQueries,
//!     recorder::EventRecorder,
//!     scope::{ScopeResolver, StaticDirectory},
//!     store::InMemoryUsageStore,
//!     types::{PrincipalId, UsageEventInput},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> usagemeter::Result<()> {
//!     let store = Arc::new(InMemoryUsageStore::new());
//!     let (recorder, _writer) = EventRecorder::spawn(store.clone(), 10_000);
//!     recorder.record(UsageEventInput::new("user-1", "gpt-4o", "openai").with_tokens(1000, 2000));
//!
//!     let pricing = PricingResolver::new(Arc::new(PricingTable::embedded()?));
//!     let directory = Arc::new(StaticDirectory::new());
//!     let queries = UsageQueries::new(
//!         Aggregator::new(store, pricing),
//!         ScopeResolver::new(directory.clone()),
//!         directory,
//!         MeterConfig::default(),
//!     );
//!
//!     let usage = queries.self_usage(&PrincipalId::new("user-1")).await?;
//!     println!("{} requests", usage.totals.requests);
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod data_loader;
pub mod params;
pub mod queries;
pub mod recorder;
pub mod scope;
pub mod store;

pub use usagemeter_core::{aggregation_types, error, filters, granularity, response, types};
pub use usagemeter_pricing as pricing;

// Re-export commonly used types
pub use error::{ErrorKind, MeterError, Result};
pub use types::{ModelName, PrincipalId, ProjectId, ScopeId, TokenCounts, UsageEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
