//! Terminal output formatting for usagemeter
//!
//! This crate renders summary and detailed usage envelopes either as
//! human-readable tables or as JSON.

pub mod output;

pub use output::{JsonFormatter, OutputFormatter, TableFormatter, get_formatter};
