//! Core domain types for usagemeter
//!
//! This module contains the fundamental types used throughout the usagemeter
//! library. These types provide strong typing for identifiers (principals,
//! projects, scopes, models), token counts, and the immutable usage event record.

use crate::error::{MeterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use uuid::Uuid;

/// Strongly-typed model name wrapper
///
/// # Examples
/// ```
/// use usagemeter_core::types::ModelName;
///
/// let model = ModelName::new("gpt-4o");
/// assert_eq!(model.as_str(), "gpt-4o");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    /// Create a new ModelName from any string-like type
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the acting user whose usage is metered
///
/// # Examples
/// ```
/// use usagemeter_core::types::PrincipalId;
///
/// let principal = PrincipalId::new("user-42");
/// assert_eq!(principal.as_str(), "user-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create a new PrincipalId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Optional grouping key attached to a usage event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Organizational grouping (company) whose members' usage is aggregated together
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque unique identifier of a stored usage event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh random identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token counts for usage tracking
///
/// `total_tokens` normally equals `input_tokens + output_tokens`, but callers
/// that pre-aggregate may supply their own total, which is kept as given.
///
/// # Examples
/// ```
/// use usagemeter_core::types::TokenCounts;
///
/// let tokens = TokenCounts::new(100, 50);
/// assert_eq!(tokens.total_tokens, 150);
///
/// // TokenCounts supports arithmetic operations
/// let combined = tokens + TokenCounts::new(50, 25);
/// assert_eq!(combined.input_tokens, 150);
/// assert_eq!(combined.total_tokens, 225);
/// ```
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    /// Prompt tokens sent to the model
    pub input_tokens: u64,
    /// Completion tokens generated by the model
    pub output_tokens: u64,
    /// Total tokens as recorded
    pub total_tokens: u64,
}

impl TokenCounts {
    /// Create new TokenCounts with `total = input + output`, saturating at `u64::MAX`
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Create TokenCounts with a caller-supplied total
    pub fn with_total(input_tokens: u64, output_tokens: u64, total_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Sums saturate at `u64::MAX` instead of wrapping
impl Add for TokenCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

impl AddAssign for TokenCounts {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Immutable record of one metered model call
///
/// Created exactly once by the recorder's writer and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: EventId,
    pub principal_id: PrincipalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub model: ModelName,
    pub provider: String,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    /// Free-text label describing the call site
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A validated event waiting for the store to assign `id` and `created_at`
#[derive(Debug, Clone, PartialEq)]
pub struct NewUsageEvent {
    pub principal_id: PrincipalId,
    pub project_id: Option<ProjectId>,
    pub model: ModelName,
    pub provider: String,
    pub tokens: TokenCounts,
    pub context: Option<String>,
}

impl NewUsageEvent {
    /// Stamp the event with its storage identity
    pub fn into_event(self, id: EventId, created_at: DateTime<Utc>) -> UsageEvent {
        UsageEvent {
            id,
            principal_id: self.principal_id,
            project_id: self.project_id,
            model: self.model,
            provider: self.provider,
            tokens: self.tokens,
            context: self.context,
            created_at,
        }
    }
}

/// Raw recorder input as supplied by a metered call site
///
/// Every field is optional on the wire so that a malformed call site produces
/// a validation failure instead of a deserialization error. Token counts
/// default to zero and `total_tokens` defaults to `input + output`.
///
/// # Examples
/// ```
/// use usagemeter_core::types::UsageEventInput;
///
/// let input: UsageEventInput = serde_json::from_str(
///     r#"{"principalId":"u1","model":"gpt-4o","provider":"openai","inputTokens":10}"#,
/// ).unwrap();
/// let event = input.validate().unwrap();
/// assert_eq!(event.tokens.output_tokens, 0);
/// assert_eq!(event.tokens.total_tokens, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEventInput {
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub context: Option<String>,
}

impl UsageEventInput {
    /// Convenience constructor for the required fields
    pub fn new(
        principal_id: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: Some(principal_id.into()),
            model: Some(model.into()),
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check required fields and apply token defaults
    pub fn validate(self) -> Result<NewUsageEvent> {
        let principal_id = required("principalId", self.principal_id)?;
        let model = required("model", self.model)?;
        let provider = required("provider", self.provider)?;

        let input_tokens = self.input_tokens.unwrap_or(0);
        let output_tokens = self.output_tokens.unwrap_or(0);
        let total_tokens = match self.total_tokens {
            Some(total) => total,
            None => input_tokens.checked_add(output_tokens).ok_or_else(|| {
                MeterError::InvalidEvent(format!(
                    "inputTokens {input_tokens} + outputTokens {output_tokens} overflows"
                ))
            })?,
        };

        Ok(NewUsageEvent {
            principal_id: PrincipalId::new(principal_id),
            project_id: non_blank(self.project_id).map(ProjectId::new),
            model: ModelName::new(model),
            provider,
            tokens: TokenCounts::with_total(input_tokens, output_tokens, total_tokens),
            context: non_blank(self.context),
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String> {
    non_blank(value).ok_or_else(|| MeterError::InvalidEvent(format!("{field} is required")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_model_name() {
        let model = ModelName::new("gpt-4o");
        assert_eq!(model.as_str(), "gpt-4o");
        assert_eq!(model.to_string(), "gpt-4o");
    }

    #[test]
    fn test_token_counts_arithmetic() {
        let tokens1 = TokenCounts::new(100, 50);
        let tokens2 = TokenCounts::with_total(200, 100, 400);

        let sum = tokens1 + tokens2;
        assert_eq!(sum.input_tokens, 300);
        assert_eq!(sum.output_tokens, 150);
        assert_eq!(sum.total_tokens, 550);
    }

    #[test]
    fn test_token_counts_saturate() {
        let near_max = TokenCounts::new(u64::MAX - 1, 0);
        let mut sum = near_max + TokenCounts::new(5, 7);
        assert_eq!(sum.input_tokens, u64::MAX);
        assert_eq!(sum.output_tokens, 7);
        assert_eq!(sum.total_tokens, u64::MAX);

        sum += near_max;
        assert_eq!(sum.total_tokens, u64::MAX);
        assert_eq!(TokenCounts::new(u64::MAX, 1).total_tokens, u64::MAX);
    }

    #[test]
    fn test_input_total_overflow_is_rejected() {
        let input: UsageEventInput = serde_json::from_str(
            r#"{"principalId":"u1","model":"gpt-4o","provider":"openai",
                "inputTokens":18446744073709551615,"outputTokens":1}"#,
        )
        .unwrap();
        assert!(matches!(input.validate(), Err(MeterError::InvalidEvent(_))));

        // An explicit total needs no addition
        let event = UsageEventInput::new("u1", "gpt-4o", "openai")
            .with_tokens(u64::MAX, 1);
        let event = UsageEventInput {
            total_tokens: Some(u64::MAX),
            ..event
        }
        .validate()
        .unwrap();
        assert_eq!(event.tokens.total_tokens, u64::MAX);
    }

    #[test]
    fn test_input_defaults() {
        let event = UsageEventInput::new("u1", "gpt-4o", "openai")
            .validate()
            .unwrap();
        assert_eq!(event.tokens, TokenCounts::default());
        assert!(event.project_id.is_none());
        assert!(event.context.is_none());
    }

    #[test]
    fn test_input_keeps_explicit_total() {
        let mut input = UsageEventInput::new("u1", "gpt-4o", "openai").with_tokens(10, 20);
        input.total_tokens = Some(99);
        let event = input.validate().unwrap();
        assert_eq!(event.tokens.total_tokens, 99);
    }

    #[test]
    fn test_input_rejects_missing_fields() {
        let missing_principal = UsageEventInput {
            model: Some("gpt-4o".into()),
            provider: Some("openai".into()),
            ..Default::default()
        };
        assert!(matches!(
            missing_principal.validate(),
            Err(MeterError::InvalidEvent(_))
        ));

        let blank_model = UsageEventInput::new("u1", "  ", "openai");
        assert!(blank_model.validate().is_err());

        let blank_provider = UsageEventInput::new("u1", "gpt-4o", "");
        assert!(blank_provider.validate().is_err());
    }

    #[test]
    fn test_blank_project_is_no_project() {
        let event = UsageEventInput::new("u1", "gpt-4o", "openai")
            .with_project("")
            .validate()
            .unwrap();
        assert!(event.project_id.is_none());
    }

    #[test]
    fn test_event_json_shape() {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let event = UsageEventInput::new("u1", "gpt-4o", "openai")
            .with_tokens(1, 2)
            .validate()
            .unwrap()
            .into_event(EventId::new_v4(), created_at);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["principalId"], "u1");
        assert_eq!(json["inputTokens"], 1);
        assert_eq!(json["totalTokens"], 3);
        assert!(json.get("projectId").is_none());

        let back: UsageEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
