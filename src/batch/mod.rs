//! Batch vat analytics
//!
//! - `phase_segmenter`: weight trajectory → labeled phase segments

pub mod phase_segmenter;

pub use phase_segmenter::PhaseSegmenter;
