//! Pricing table and cost resolver for usagemeter
//!
//! This crate loads the per-model pricing table once at startup and
//! computes monetary cost from raw token counts.

pub mod pricing_table;
pub mod resolver;

pub use pricing_table::{FamilyRule, ModelPricing, PricingSource, PricingTable};
pub use resolver::{PriceMatch, PricingResolver};
