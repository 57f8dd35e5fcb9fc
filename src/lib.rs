//! Plantwatch: historian analytics for filling lines and batch vats
//!
//! Turns raw historian samples into OEE breakdowns, batch phase timelines
//! and phase-aware SPC results.
//!
//! ## Architecture
//!
//! - **production**: counter deltas, OEE and production summary
//! - **batch**: vat weight phase segmentation
//! - **spc**: statistics, Western Electric rules, violation annotation
//! - **pipeline**: fetch → compute → assemble, including site fan-out
//! - **acquisition**: historian fetch capability and window resolution
//!
//! The computational components are pure functions of their inputs; only
//! `acquisition` performs I/O.

pub mod acquisition;
pub mod batch;
pub mod config;
pub mod pipeline;
pub mod production;
pub mod spc;
pub mod types;

// Re-export configuration
pub use config::PlantConfig;

// Re-export commonly used types
pub use types::{
    AnalysisEntry, AnalysisError, AnalysisRecord, AnalysisWindow, DataRange, FetchError,
    OeeResult, Phase, PhaseSegment, Sample, SiteReport, TagKind, Violation,
};

// Re-export the entry points
pub use acquisition::{HistorianFetch, MemoryHistorian, TimebaseClient, WindowSpec};
pub use pipeline::Analyzer;
pub use spc::LimitOverrides;
