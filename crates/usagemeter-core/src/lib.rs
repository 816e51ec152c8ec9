//! Core types, traits, and utilities for usagemeter
//!
//! This crate provides the foundational types, error handling,
//! filter specification, time bucketing, response envelopes, and the
//! storage trait used by all other usagemeter crates.

pub mod aggregation_types;
pub mod error;
pub mod filters;
pub mod granularity;
pub mod response;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, MeterError, Result};
pub use filters::{Pagination, PrincipalSet, UsageFilter};
pub use granularity::Granularity;
pub use response::{DetailedUsageResponse, UsageSummaryResponse};
pub use store::UsageStore;
pub use types::{
    EventId, ModelName, NewUsageEvent, PrincipalId, ProjectId, ScopeId, TokenCounts, UsageEvent,
    UsageEventInput,
};
