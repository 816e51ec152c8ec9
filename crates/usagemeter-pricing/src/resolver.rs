//! Cost resolution from raw token counts
//!
//! Resolution order is exact key, then the table's ordered family rules,
//! then zero cost. It never fails, so it can sit inside aggregation loops.
//!
//! # Examples
//!
//! ```
//! use usagemeter_pricing::{PricingResolver, PricingTable};
//! use std::sync::Arc;
//!
//! let resolver = PricingResolver::new(Arc::new(PricingTable::embedded().unwrap()));
//!
//! let cost = resolver.cost_of("gpt-4o", 1_000_000, 0);
//! assert_eq!(cost, 2.50);
//!
//! // Unknown models cost nothing rather than failing
//! assert_eq!(resolver.cost_of("totally-unknown-model-xyz", 1000, 1000), 0.0);
//! ```

use crate::pricing_table::{ModelPricing, PricingTable};
use std::sync::Arc;
use tracing::debug;
use usagemeter_core::types::{ModelName, TokenCounts};

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// How a model's price was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceMatch {
    /// The model string is a configured key
    Exact,
    /// A family rule mapped the model to this key
    Family(String),
    /// Nothing matched; the model is priced at zero
    Unpriced,
}

impl PriceMatch {
    pub fn is_priced(&self) -> bool {
        !matches!(self, Self::Unpriced)
    }
}

/// Pure cost function over an injected, immutable pricing table
#[derive(Debug, Clone)]
pub struct PricingResolver {
    table: Arc<PricingTable>,
}

impl PricingResolver {
    pub fn new(table: Arc<PricingTable>) -> Self {
        Self { table }
    }

    /// Find the rates for `model`
    pub fn resolve(&self, model: &str) -> (ModelPricing, PriceMatch) {
        if let Some(pricing) = self.table.get(model) {
            return (*pricing, PriceMatch::Exact);
        }

        if let Some((rule, pricing)) = self.table.find_family(model) {
            return (*pricing, PriceMatch::Family(rule.model_key.clone()));
        }

        debug!("No pricing for model {}, treating as unpriced", model);
        (ModelPricing::default(), PriceMatch::Unpriced)
    }

    /// Cost of a call to `model` with the given token counts
    pub fn cost_of(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let (pricing, _) = self.resolve(model);
        Self::calculate_from_pricing(input_tokens, output_tokens, &pricing)
    }

    /// Cost of summed token counts for one model
    pub fn cost_of_tokens(&self, model: &ModelName, tokens: &TokenCounts) -> f64 {
        self.cost_of(model.as_str(), tokens.input_tokens, tokens.output_tokens)
    }

    /// Apply rates without any lookup; no rounding is done here
    pub fn calculate_from_pricing(
        input_tokens: u64,
        output_tokens: u64,
        pricing: &ModelPricing,
    ) -> f64 {
        (input_tokens as f64 / TOKENS_PER_MILLION) * pricing.input_cost_per_million
            + (output_tokens as f64 / TOKENS_PER_MILLION) * pricing.output_cost_per_million
    }
}
