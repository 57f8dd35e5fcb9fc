//! Statistical Process Control
//!
//! ## Architecture
//! - `stats`: summary statistics and ±3σ control limits (statrs)
//! - `rules`: the four Western Electric rules in one streaming pass
//! - `annotator`: batch-cycle context for violations on vat weight tags

pub mod stats;
pub mod rules;
pub mod annotator;

pub use stats::{LimitOverrides, SpcStatEngine};
pub use rules::WesternElectricEvaluator;
pub use annotator::ViolationAnnotator;
