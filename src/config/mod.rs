//! Plant Configuration Module
//!
//! Historian endpoint, analysis tunables, and site layout loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `PLANTWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `plantwatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! There is no global: the binary loads one `PlantConfig` and hands it to
//! the `Analyzer`, which owns it behind an `Arc`.
//!
//! ```ignore
//! let config = PlantConfig::load();
//! config.validate()?;
//! let analyzer = Analyzer::new(fetcher, config);
//! ```

mod plant_config;
pub mod defaults;
pub mod validation;

pub use plant_config::*;

