//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.
//!
//! `[sites.<name>]` tables are keyed by site name, so only their fields are
//! checked.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Fields allowed inside each `[sites.<name>]` table
pub const SITE_FIELDS: &[&str] = &["filling_lines", "vats", "tanks"];

/// Returns the complete set of valid dotted key paths for PlantConfig,
/// excluding the per-site tables.
///
/// This is maintained manually to match the struct hierarchy in plant_config.rs.
/// Any new field added to PlantConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [historian]
        "historian",
        "historian.base_url",
        "historian.dataset",
        "historian.timeout_secs",
        "historian.max_retries",
        "historian.initial_backoff_ms",
        "historian.max_backoff_ms",
        "historian.batch_size",
        // [quality]
        "quality",
        "quality.restart_quality_code",
        "quality.default_quality_code",
        // [spc]
        "spc",
        "spc.min_points_for_rules",
        "spc.max_violation_details_per_rule",
        "spc.artifact_boundary_secs",
        // [batch]
        "batch",
        "batch.flat_tolerance",
        "batch.zero_tolerance",
        "batch.pasteurize_drop_min",
        "batch.pasteurize_drop_max",
        "batch.gap_factor",
        "batch.min_gap_secs",
        "batch.mix_duration_secs",
        "batch.cool_min_secs",
        "batch.cool_max_secs",
        "batch.blocked_min_secs",
        "batch.blocked_max_secs",
        "batch.cip_max_secs",
        "batch.strict_ambiguity",
        // [shifts]
        "shifts",
        "shifts.day_start_hour",
        "shifts.night_start_hour",
        // [layout]
        "layout",
        "layout.filler_area",
        "layout.process_area",
        "layout.mixroom",
        "layout.storage_room",
        "layout.line_equipment",
        // [sites]
        "sites",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction<'a, I>(unknown: &str, known: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    known
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if known.contains(key.as_str()) {
            continue;
        }

        if let Some(rest) = key.strip_prefix("sites.") {
            // sites.<name> is free-form; sites.<name>.<field> is checked
            let Some((site, field)) = rest.split_once('.') else {
                continue;
            };
            if SITE_FIELDS.contains(&field) {
                continue;
            }
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                suggestion: suggest_correction(field, SITE_FIELDS.iter().copied())
                    .map(|f| format!("sites.{site}.{f}")),
                field: key,
            });
            continue;
        }

        warnings.push(ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, known.iter().copied()),
            field: key,
        });
    }

    warnings
}

// ============================================================================
// Plausibility Checks
// ============================================================================

/// Check values that parse and order correctly but are unlikely to be intended.
///
/// Returns (errors, warnings): errors must prevent startup; warnings are
/// suspicious but not fatal.
pub fn validate_plausible_ranges(
    config: &super::PlantConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let h = &config.historian;
    if !(h.base_url.starts_with("http://") || h.base_url.starts_with("https://")) {
        errors.push(format!(
            "historian.base_url = '{}' must be an http(s) URL",
            h.base_url
        ));
    }
    if h.timeout_secs > 120 {
        warnings.push(ValidationWarning {
            field: "historian.timeout_secs".to_string(),
            message: format!(
                "historian.timeout_secs = {} is unusually long for a single query",
                h.timeout_secs
            ),
            suggestion: None,
        });
    }

    if config.spc.min_points_for_rules < 14 {
        warnings.push(ValidationWarning {
            field: "spc.min_points_for_rules".to_string(),
            message: format!(
                "spc.min_points_for_rules = {} is below the 14 points rule 4 needs",
                config.spc.min_points_for_rules
            ),
            suggestion: None,
        });
    }

    if config.spc.artifact_boundary_secs > 3_600 {
        warnings.push(ValidationWarning {
            field: "spc.artifact_boundary_secs".to_string(),
            message: format!(
                "spc.artifact_boundary_secs = {} would dismiss most rule 1 firings on vats",
                config.spc.artifact_boundary_secs
            ),
            suggestion: None,
        });
    }

    let b = &config.batch;
    if b.mix_duration_secs > b.cool_max_secs + b.blocked_max_secs {
        warnings.push(ValidationWarning {
            field: "batch.mix_duration_secs".to_string(),
            message: format!(
                "batch.mix_duration_secs = {} is longer than a full cool + blocked hold",
                b.mix_duration_secs
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlantConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("pasteurise", "pasteurize"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [batch]
            cool_max_secs = 840
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"batch".to_string()));
        assert!(keys.contains(&"batch.cool_max_secs".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[batch]
cool_max_sec = 840
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "batch.cool_max_sec");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("batch.cool_max_secs")
        );
    }

    #[test]
    fn test_site_tables_are_free_form() {
        let toml_str = r#"
[sites.Site7]
filling_lines = ["fillingline01"]
vats = ["vat01"]
"#;
        assert!(validate_unknown_keys(toml_str).is_empty());
    }

    #[test]
    fn test_site_field_typo_suggests_site_field() {
        let toml_str = r#"
[sites.Site1]
vat = ["vat01"]
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].suggestion.as_deref(), Some("sites.Site1.vats"));
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let toml_str = r#"
[metrics]
enabled = true
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field == "metrics"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", known.iter().copied()).is_none());
    }

    #[test]
    fn test_plausibility_defaults_clean() {
        let (errors, warnings) = validate_plausible_ranges(&PlantConfig::default());
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_non_http_base_url_is_error() {
        let mut config = PlantConfig::default();
        config.historian.base_url = "localhost:4511".to_string();
        let (errors, _) = validate_plausible_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("historian.base_url")));
    }

    #[test]
    fn test_low_rule_minimum_warns() {
        let mut config = PlantConfig::default();
        config.spc.min_points_for_rules = 10;
        let (_, warnings) = validate_plausible_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "spc.min_points_for_rules"));
    }
}
