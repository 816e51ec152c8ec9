//! Per-model pricing table
//!
//! The table is loaded once at process start and is read-only afterwards.
//! It can come from the embedded default, a JSON file, or a one-shot HTTP
//! fetch; a failed file or network load falls back to the embedded table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use usagemeter_core::error::{MeterError, Result};

/// Embedded pricing data used when no other source is configured
const EMBEDDED_PRICING: &str = include_str!("../embedded/pricing.json");

/// Input/output rates for one model, in currency units per million tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPricing {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

/// Substring fallback: a model matching every needle prices as `model_key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRule {
    pub contains: Vec<String>,
    pub model_key: String,
}

impl FamilyRule {
    pub fn new(contains: &[&str], model_key: impl Into<String>) -> Self {
        Self {
            contains: contains.iter().map(|s| s.to_lowercase()).collect(),
            model_key: model_key.into(),
        }
    }

    /// `model` must already be lowercased
    pub(crate) fn matches(&self, model: &str) -> bool {
        !self.contains.is_empty() && self.contains.iter().all(|needle| model.contains(needle))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingEntryDoc {
    model_key: String,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingDoc {
    models: Vec<PricingEntryDoc>,
    #[serde(default)]
    family_rules: Vec<FamilyRule>,
}

/// Where to load the pricing table from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PricingSource {
    #[default]
    Embedded,
    File(PathBuf),
    Url(String),
}

/// Immutable pricing configuration: exact entries plus ordered family rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
    rules: Vec<FamilyRule>,
}

impl PricingTable {
    /// Build a table, rejecting negative or non-finite rates and rules that
    /// point at a missing entry
    pub fn new(
        entries: impl IntoIterator<Item = (String, ModelPricing)>,
        rules: Vec<FamilyRule>,
    ) -> Result<Self> {
        let entries: HashMap<String, ModelPricing> = entries.into_iter().collect();

        for (key, pricing) in &entries {
            let valid = |rate: f64| rate.is_finite() && rate >= 0.0;
            if !valid(pricing.input_cost_per_million) || !valid(pricing.output_cost_per_million) {
                return Err(MeterError::Config(format!(
                    "pricing for '{key}' must be non-negative"
                )));
            }
        }

        let rules = rules
            .into_iter()
            .map(|rule| FamilyRule {
                contains: rule.contains.iter().map(|s| s.to_lowercase()).collect(),
                model_key: rule.model_key,
            })
            .collect::<Vec<_>>();

        for rule in &rules {
            if !entries.contains_key(&rule.model_key) {
                return Err(MeterError::Config(format!(
                    "family rule {:?} references unknown model '{}'",
                    rule.contains, rule.model_key
                )));
            }
        }

        Ok(Self { entries, rules })
    }

    /// Parse the JSON table format
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: PricingDoc = serde_json::from_str(json)?;
        let entries = doc.models.into_iter().map(|entry| {
            (
                entry.model_key,
                ModelPricing {
                    input_cost_per_million: entry.input_cost_per_million,
                    output_cost_per_million: entry.output_cost_per_million,
                },
            )
        });
        Self::new(entries, doc.family_rules)
    }

    /// The table compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json_str(EMBEDDED_PRICING)
    }

    /// Read a table from a JSON file
    pub async fn from_file(path: &std::path::Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }

    /// Fetch a table over HTTP
    pub async fn fetch(url: &str) -> Result<Self> {
        let response = reqwest::Client::new()
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        let json = response.text().await?;
        Self::from_json_str(&json)
    }

    /// Load from `source`, falling back to the embedded table on failure
    pub async fn load(source: &PricingSource) -> Result<Self> {
        let loaded = match source {
            PricingSource::Embedded => {
                info!("Using embedded pricing table");
                return Self::embedded();
            }
            PricingSource::File(path) => Self::from_file(path).await,
            PricingSource::Url(url) => Self::fetch(url).await,
        };

        match loaded {
            Ok(table) => {
                info!(
                    "Loaded pricing table with {} models from {:?}",
                    table.len(),
                    source
                );
                Ok(table)
            }
            Err(e) => {
                warn!("Failed to load pricing table from {:?}: {}, using embedded table", source, e);
                Self::embedded()
            }
        }
    }

    /// Exact lookup by model key
    pub fn get(&self, model_key: &str) -> Option<&ModelPricing> {
        self.entries.get(model_key)
    }

    /// Family rules in evaluation order
    pub fn rules(&self) -> &[FamilyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First family rule matching `model`, with its entry
    pub(crate) fn find_family(&self, model: &str) -> Option<(&FamilyRule, &ModelPricing)> {
        let lowered = model.to_lowercase();
        let found = self.rules.iter().find(|rule| rule.matches(&lowered))?;
        debug!("Found pricing for {} using family rule {:?}", model, found.contains);
        self.entries.get(&found.model_key).map(|pricing| (found, pricing))
    }
}
