//! Plant Configuration - historian, analysis tunables, and site layout as TOML values
//!
//! Each struct implements `Default` with the documented constants, so
//! behavior without a config file is identical to behavior with an empty one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Env var naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PLANTWATCH_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "plantwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `PlantConfig::load()` which searches:
/// 1. `$PLANTWATCH_CONFIG` env var
/// 2. `./plantwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    /// Historian endpoint and fetch behavior
    #[serde(default)]
    pub historian: HistorianConfig,

    /// Quality code semantics
    #[serde(default)]
    pub quality: QualityConfig,

    /// SPC / Western Electric evaluation
    #[serde(default)]
    pub spc: SpcConfig,

    /// Vat phase segmentation tolerances and duration priors
    #[serde(default)]
    pub batch: BatchConfig,

    /// Shift boundaries for named windows
    #[serde(default)]
    pub shifts: ShiftConfig,

    /// Area names used to build tag paths
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Equipment per site, keyed by site name (`Site1`, ...)
    #[serde(default = "default_sites")]
    pub sites: BTreeMap<String, SiteConfig>,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            historian: HistorianConfig::default(),
            quality: QualityConfig::default(),
            spc: SpcConfig::default(),
            batch: BatchConfig::default(),
            shifts: ShiftConfig::default(),
            layout: LayoutConfig::default(),
            sites: default_sites(),
        }
    }
}

impl PlantConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PLANTWATCH_CONFIG` environment variable
    /// 2. `./plantwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), sites = config.sites.len(), "Loaded plant config from PLANTWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from PLANTWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "PLANTWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./plantwatch.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(sites = config.sites.len(), "Loaded plant config from ./plantwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./plantwatch.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No plantwatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        let typo_warnings = super::validation::validate_unknown_keys(contents);
        for w in &typo_warnings {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Timeouts, batch sizes, and retry counts must be usable
    /// - Min/max pairs must be ordered
    /// - Drop fractions must lie in (0, 1)
    /// - Shift hours must be distinct hours of the day
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let h = &self.historian;
        if h.base_url.trim().is_empty() {
            errors.push("historian.base_url must not be empty".to_string());
        }
        if h.timeout_secs == 0 {
            errors.push("historian.timeout_secs must be > 0".to_string());
        }
        if h.batch_size == 0 {
            errors.push("historian.batch_size must be > 0".to_string());
        }
        if h.max_retries == 0 {
            errors.push("historian.max_retries must be > 0 (1 = no retry)".to_string());
        }
        Self::check_ordered(
            h.initial_backoff_ms as f64,
            h.max_backoff_ms as f64,
            "historian.backoff_ms",
            &mut errors,
        );

        if self.quality.restart_quality_code == self.quality.default_quality_code {
            errors.push(format!(
                "quality.restart_quality_code ({}) must differ from default_quality_code",
                self.quality.restart_quality_code
            ));
        }

        let s = &self.spc;
        if s.min_points_for_rules < 2 {
            errors.push("spc.min_points_for_rules must be >= 2".to_string());
        }
        if s.max_violation_details_per_rule == 0 {
            errors.push("spc.max_violation_details_per_rule must be > 0".to_string());
        }

        let b = &self.batch;
        for (name, value) in [
            ("batch.flat_tolerance", b.flat_tolerance),
            ("batch.zero_tolerance", b.zero_tolerance),
            ("batch.gap_factor", b.gap_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{name} must be a finite value >= 0 (got {value})"));
            }
        }
        if !(b.pasteurize_drop_min > 0.0 && b.pasteurize_drop_max < 1.0) {
            errors.push(format!(
                "batch.pasteurize_drop range ({}, {}) must lie within (0, 1)",
                b.pasteurize_drop_min, b.pasteurize_drop_max
            ));
        }
        Self::check_ordered(
            b.pasteurize_drop_min,
            b.pasteurize_drop_max,
            "batch.pasteurize_drop",
            &mut errors,
        );
        Self::check_ordered(
            b.cool_min_secs as f64,
            b.cool_max_secs as f64,
            "batch.cool_secs",
            &mut errors,
        );
        Self::check_ordered(
            b.blocked_min_secs as f64,
            b.blocked_max_secs as f64,
            "batch.blocked_secs",
            &mut errors,
        );
        if b.cip_max_secs == 0 {
            errors.push("batch.cip_max_secs must be > 0".to_string());
        }
        for (name, value) in [
            ("spc.artifact_boundary_secs", s.artifact_boundary_secs),
            ("batch.min_gap_secs", b.min_gap_secs),
            ("batch.mix_duration_secs", b.mix_duration_secs),
            ("batch.cool_min_secs", b.cool_min_secs),
            ("batch.cool_max_secs", b.cool_max_secs),
            ("batch.blocked_min_secs", b.blocked_min_secs),
            ("batch.blocked_max_secs", b.blocked_max_secs),
            ("batch.cip_max_secs", b.cip_max_secs),
        ] {
            if value > defaults::MAX_DURATION_SECS {
                errors.push(format!(
                    "{name} ({value}) must be <= {}",
                    defaults::MAX_DURATION_SECS
                ));
            }
        }

        let sh = &self.shifts;
        if sh.day_start_hour > 23 || sh.night_start_hour > 23 {
            errors.push("shifts hours must be within 0-23".to_string());
        }
        if sh.day_start_hour >= sh.night_start_hour {
            errors.push(format!(
                "shifts.day_start_hour ({}) must be before night_start_hour ({})",
                sh.day_start_hour, sh.night_start_hour
            ));
        }

        for (name, site) in &self.sites {
            if site.filling_lines.is_empty() && site.vats.is_empty() && site.tanks.is_empty() {
                errors.push(format!("sites.{name} has no equipment configured"));
            }
        }

        let (range_errors, range_warnings) = super::validation::validate_plausible_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_ordered(min: f64, max: f64, name: &str, errors: &mut Vec<String>) {
        // NaN/Inf comparisons silently pass, catch them explicitly
        if !min.is_finite() || !max.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got min={min}, max={max})"
            ));
            return;
        }
        if max < min {
            errors.push(format!("{name}: max ({max}) must be >= min ({min})"));
        }
    }

    /// Equipment of the site named by the last segment of `site_path`
    /// (`Enterprise B/Site1` → `Site1`).
    pub fn site(&self, site_path: &str) -> Option<&SiteConfig> {
        let name = site_path.trim_end_matches('/').rsplit('/').next()?;
        self.sites.get(name)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Historian
// ============================================================================

/// Timebase historian HTTP endpoint and fetch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorianConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per batch, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Tags per HTTP request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_base_url() -> String { "http://localhost:4511".to_string() }
fn default_dataset() -> String { "Virtual Factory".to_string() }
fn default_timeout_secs() -> u64 { 10 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 8_000 }
fn default_batch_size() -> usize { 5 }

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dataset: default_dataset(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            batch_size: default_batch_size(),
        }
    }
}

// ============================================================================
// Quality Codes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Samples with this code were written during a historian restart
    #[serde(default = "default_restart_quality_code")]
    pub restart_quality_code: i32,

    /// Assumed when the historian omits the quality field
    #[serde(default = "default_quality_code")]
    pub default_quality_code: i32,
}

fn default_restart_quality_code() -> i32 { crate::types::quality_codes::HISTORIAN_RESTART }
fn default_quality_code() -> i32 { crate::types::quality_codes::GOOD }

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            restart_quality_code: default_restart_quality_code(),
            default_quality_code: default_quality_code(),
        }
    }
}

// ============================================================================
// SPC
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpcConfig {
    /// Below this many points only summary statistics are reported
    #[serde(default = "default_min_points_for_rules")]
    pub min_points_for_rules: usize,

    /// Detailed violations listed per rule; the summary still counts all
    #[serde(default = "default_max_violation_details")]
    pub max_violation_details_per_rule: usize,

    /// Rule 1 firings this close to a Fill start or Transfer/CIP edge are artifacts
    #[serde(default = "default_artifact_boundary_secs")]
    pub artifact_boundary_secs: u64,
}

fn default_min_points_for_rules() -> usize { 20 }
fn default_max_violation_details() -> usize { 3 }
fn default_artifact_boundary_secs() -> u64 { 300 }

impl Default for SpcConfig {
    fn default() -> Self {
        Self {
            min_points_for_rules: default_min_points_for_rules(),
            max_violation_details_per_rule: default_max_violation_details(),
            artifact_boundary_secs: default_artifact_boundary_secs(),
        }
    }
}

// ============================================================================
// Batch Phase Segmentation
// ============================================================================

/// Weight tolerances and phase duration priors.
///
/// Durations come from observed vat cycles: Cool 0.1-14 min, Blocked 6-20 min.
/// The overlap is deliberately left ambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Steps within ± this weight are flat
    #[serde(default = "default_flat_tolerance")]
    pub flat_tolerance: f64,

    /// Weights within ± this are an empty vat
    #[serde(default = "default_zero_tolerance")]
    pub zero_tolerance: f64,

    /// Pasteurize→Cool drop as a fraction of the held weight
    #[serde(default = "default_pasteurize_drop_min")]
    pub pasteurize_drop_min: f64,

    #[serde(default = "default_pasteurize_drop_max")]
    pub pasteurize_drop_max: f64,

    /// Steps longer than `gap_factor × median step` are deadband gaps
    #[serde(default = "default_gap_factor")]
    pub gap_factor: f64,

    #[serde(default = "default_min_gap_secs")]
    pub min_gap_secs: u64,

    /// Mix duration assumed when no sample marks the Mix→Pasteurize edge
    #[serde(default = "default_mix_duration_secs")]
    pub mix_duration_secs: u64,

    #[serde(default = "default_cool_min_secs")]
    pub cool_min_secs: u64,

    #[serde(default = "default_cool_max_secs")]
    pub cool_max_secs: u64,

    #[serde(default = "default_blocked_min_secs")]
    pub blocked_min_secs: u64,

    #[serde(default = "default_blocked_max_secs")]
    pub blocked_max_secs: u64,

    /// Empty-vat time after a drain attributed to CIP before it becomes Idle
    #[serde(default = "default_cip_max_secs")]
    pub cip_max_secs: u64,

    /// Fail vat analyses with unresolved Cool/Blocked ambiguity instead of annotating them
    #[serde(default)]
    pub strict_ambiguity: bool,
}

fn default_flat_tolerance() -> f64 { 1.0 }
fn default_zero_tolerance() -> f64 { 1.0 }
fn default_pasteurize_drop_min() -> f64 { 0.007 }
fn default_pasteurize_drop_max() -> f64 { 0.017 }
fn default_gap_factor() -> f64 { 5.0 }
fn default_min_gap_secs() -> u64 { 120 }
fn default_mix_duration_secs() -> u64 { 600 }
fn default_cool_min_secs() -> u64 { 6 }
fn default_cool_max_secs() -> u64 { 840 }
fn default_blocked_min_secs() -> u64 { 360 }
fn default_blocked_max_secs() -> u64 { 1_200 }
fn default_cip_max_secs() -> u64 { 1_800 }

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            flat_tolerance: default_flat_tolerance(),
            zero_tolerance: default_zero_tolerance(),
            pasteurize_drop_min: default_pasteurize_drop_min(),
            pasteurize_drop_max: default_pasteurize_drop_max(),
            gap_factor: default_gap_factor(),
            min_gap_secs: default_min_gap_secs(),
            mix_duration_secs: default_mix_duration_secs(),
            cool_min_secs: default_cool_min_secs(),
            cool_max_secs: default_cool_max_secs(),
            blocked_min_secs: default_blocked_min_secs(),
            blocked_max_secs: default_blocked_max_secs(),
            cip_max_secs: default_cip_max_secs(),
            strict_ambiguity: false,
        }
    }
}

// ============================================================================
// Shifts
// ============================================================================

/// Two 12-hour shifts in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftConfig {
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,

    #[serde(default = "default_night_start_hour")]
    pub night_start_hour: u32,
}

fn default_day_start_hour() -> u32 { 6 }
fn default_night_start_hour() -> u32 { 18 }

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            day_start_hour: default_day_start_hour(),
            night_start_hour: default_night_start_hour(),
        }
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Area names between a site path and its equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_filler_area")]
    pub filler_area: String,

    #[serde(default = "default_process_area")]
    pub process_area: String,

    #[serde(default = "default_mixroom")]
    pub mixroom: String,

    #[serde(default = "default_storage_room")]
    pub storage_room: String,

    /// Machines on every filling line that publish a state name
    #[serde(default = "default_line_equipment")]
    pub line_equipment: Vec<String>,
}

fn default_filler_area() -> String { "fillerproduction".to_string() }
fn default_process_area() -> String { "liquidprocessing".to_string() }
fn default_mixroom() -> String { "mixroom01".to_string() }
fn default_storage_room() -> String { "storage".to_string() }
fn default_line_equipment() -> Vec<String> {
    ["washer", "filler", "caploader"].iter().map(|s| s.to_string()).collect()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            filler_area: default_filler_area(),
            process_area: default_process_area(),
            mixroom: default_mixroom(),
            storage_room: default_storage_room(),
            line_equipment: default_line_equipment(),
        }
    }
}

impl LayoutConfig {
    /// `Enterprise B/Site1` + `fillingline01` → `Enterprise B/Site1/fillerproduction/fillingline01`
    pub fn line_path(&self, site_path: &str, line: &str) -> String {
        format!("{}/{}/{}", site_path.trim_end_matches('/'), self.filler_area, line)
    }

    pub fn vat_weight_tag(&self, site_path: &str, vat: &str) -> String {
        format!(
            "{}/{}/{}/{}/processdata/process/weight",
            site_path.trim_end_matches('/'),
            self.process_area,
            self.mixroom,
            vat
        )
    }

    pub fn tank_weight_tag(&self, site_path: &str, tank: &str) -> String {
        format!(
            "{}/{}/{}/{}/processdata/process/weight",
            site_path.trim_end_matches('/'),
            self.process_area,
            self.storage_room,
            tank
        )
    }

    pub fn equipment_state_tag(&self, line_path: &str, equipment: &str) -> String {
        format!("{}/{}/processdata/state/name", line_path.trim_end_matches('/'), equipment)
    }

    pub fn vat_state_tag(&self, site_path: &str, vat: &str) -> String {
        format!(
            "{}/{}/{}/{}/processdata/state/name",
            site_path.trim_end_matches('/'),
            self.process_area,
            self.mixroom,
            vat
        )
    }

    /// Tag probed to find a site's data range
    pub fn probe_tag(&self, site_path: &str, first_line: &str) -> String {
        format!("{}/metric/oee", self.line_path(site_path, first_line))
    }
}

// ============================================================================
// Sites
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub filling_lines: Vec<String>,

    #[serde(default)]
    pub vats: Vec<String>,

    /// Storage tanks: weight SPC only, never phase-annotated
    #[serde(default)]
    pub tanks: Vec<String>,
}

fn numbered(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix}{i:02}")).collect()
}

fn default_sites() -> BTreeMap<String, SiteConfig> {
    [("Site1", 3, 4), ("Site2", 2, 2), ("Site3", 1, 1)]
        .into_iter()
        .map(|(name, lines, vats)| {
            (
                name.to_string(),
                SiteConfig {
                    filling_lines: numbered("fillingline", lines),
                    vats: numbered("vat", vats),
                    tanks: Vec::new(),
                },
            )
        })
        .collect()
}
