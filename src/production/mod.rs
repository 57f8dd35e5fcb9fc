//! Production analytics: counter deltas and OEE
//!
//! Cumulative counters (`timerunning`, `countoutfeed`, ...) only become
//! meaningful as window deltas, and rate tags only as their latest valid
//! reading. Both reductions live in `counters`; `oee` combines them.
//!
//! ## Architecture
//! - `counters`: CounterDeltaCalculator (restart-artifact aware) and rate helpers
//! - `oee`: OEEComputer and the production summary reported next to it

pub mod counters;
pub mod oee;

pub use counters::CounterDeltaCalculator;
pub use oee::OeeComputer;
