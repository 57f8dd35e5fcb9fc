//! Analysis pipeline: fetch, compute, assemble

pub mod analyzer;
pub mod assembler;

pub use analyzer::{Analyzer, Target};
pub use assembler::{OeeOutcome, ResultAssembler, SpcOutcome};
