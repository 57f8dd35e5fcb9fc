//! Historian data acquisition
//!
//! The fetch capability and window resolution. Everything that touches the
//! network or the wall clock lives here.

pub mod historian;
pub mod window;

pub use historian::{HistorianFetch, LatestValues, MemoryHistorian, TagSeries, TimebaseClient};
pub use window::{recommend_window, ShiftName, TimeSpec, WindowError, WindowSpec};
