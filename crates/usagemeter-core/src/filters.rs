//! Filtering module for usage events
//!
//! [`UsageFilter`] is the single predicate every aggregation sub-query sees.
//! It is built once per request, validated on construction, and then only
//! read, so the model/project/time/listing queries of one response can never
//! disagree about which rows they cover.
//!
//! # Examples
//!
//! ```
//! use usagemeter_core::filters::UsageFilter;
//! use usagemeter_core::types::{ModelName, PrincipalId};
//! use chrono::{TimeZone, Utc};
//!
//! let filter = UsageFilter::for_principal(PrincipalId::new("u1"))
//!     .with_date_range(
//!         Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
//!         Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()),
//!     )
//!     .unwrap()
//!     .with_model(ModelName::new("gpt-4o"));
//! assert!(filter.model().is_some());
//! ```

use crate::error::{MeterError, Result};
use crate::types::{ModelName, PrincipalId, ProjectId, UsageEvent};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Which principals a filter covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PrincipalSet {
    /// No principal restriction (global view)
    #[default]
    All,
    /// Only the listed principals; an empty set matches nothing
    Only(BTreeSet<PrincipalId>),
}

impl PrincipalSet {
    pub fn contains(&self, principal: &PrincipalId) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(principal),
        }
    }

    /// True when no principal can match
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(set) if set.is_empty())
    }

    /// Narrow this set to the members of `restriction`
    pub fn intersect(&self, restriction: &BTreeSet<PrincipalId>) -> Self {
        match self {
            Self::All => Self::Only(restriction.clone()),
            Self::Only(set) => Self::Only(set.intersection(restriction).cloned().collect()),
        }
    }
}

/// Typed, immutable predicate over usage events
///
/// All bounds are inclusive. A missing bound means unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageFilter {
    principals: PrincipalSet,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    project: Option<ProjectId>,
    model: Option<ModelName>,
}

impl UsageFilter {
    /// Create a filter with no restrictions
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on a single principal
    pub fn for_principal(principal: PrincipalId) -> Self {
        Self::for_principals(std::iter::once(principal))
    }

    /// Filter on a set of principals
    pub fn for_principals(principals: impl IntoIterator<Item = PrincipalId>) -> Self {
        Self {
            principals: PrincipalSet::Only(principals.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Set the date range, rejecting `start > end`
    pub fn with_date_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(MeterError::InvalidDateRange { start, end });
        }
        self.start = start;
        self.end = end;
        Ok(self)
    }

    pub fn with_project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_model(mut self, model: ModelName) -> Self {
        self.model = Some(model);
        self
    }

    /// Intersect the principal set with an authorization restriction
    pub fn restricted_to(mut self, members: &BTreeSet<PrincipalId>) -> Self {
        self.principals = self.principals.intersect(members);
        self
    }

    pub fn principals(&self) -> &PrincipalSet {
        &self.principals
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn project(&self) -> Option<&ProjectId> {
        self.project.as_ref()
    }

    pub fn model(&self) -> Option<&ModelName> {
        self.model.as_ref()
    }

    /// True when the filter can never match an event
    pub fn is_unsatisfiable(&self) -> bool {
        self.principals.is_empty()
    }

    /// Check if an event passes the filter
    pub fn matches(&self, event: &UsageEvent) -> bool {
        if !self.principals.contains(&event.principal_id) {
            return false;
        }

        if let Some(start) = &self.start
            && event.created_at < *start
        {
            return false;
        }

        if let Some(end) = &self.end
            && event.created_at > *end
        {
            return false;
        }

        if let Some(project) = &self.project
            && event.project_id.as_ref() != Some(project)
        {
            return false;
        }

        if let Some(model) = &self.model
            && &event.model != model
        {
            return false;
        }

        true
    }
}

/// Limit/offset window over a newest-first listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Pagination {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Whether rows remain past this page given the total row count
    pub fn has_more(&self, total: u64) -> bool {
        ((self.offset as u64).saturating_add(self.limit as u64)) < total
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
