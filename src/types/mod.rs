//! Shared value records for historian analytics
//!
//! Every record here is produced by pure computation over an immutable
//! sample snapshot and is never mutated after construction:
//! - Samples & windows: `Sample`, `AnalysisWindow`
//! - Tag classification: `TagKind`, `Vessel`
//! - Production: `CounterWindowDelta`, `OeeRatio`, `OeeResult`, `ProductionSummary`
//! - Batch phases: `Phase`, `PhaseSegment`, `AmbiguousPhase`
//! - SPC: `SummaryStatistics`, `ControlLimits`, `Zone`, `Severity`, `Violation`
//! - Output: `AnalysisRecord`, `AnalysisEntry`, `SiteReport`, `DataRange`

mod sample;
mod tag;
mod production;
mod phase;
mod spc;
mod report;
mod error;

pub use sample::*;
pub use tag::*;
pub use production::*;
pub use phase::*;
pub use spc::*;
pub use report::*;
pub use error::*;
