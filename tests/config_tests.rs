//! Config Loading Tests
//!
//! Exercise `PlantConfig` through files on disk: typo warnings, hard
//! validation failures, custom sites and the TOML round trip.

use std::io::Write;

use plantwatch::config::validation::{validate_plausible_ranges, validate_unknown_keys};
use plantwatch::config::{ConfigError, PlantConfig};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn full_config_loads_from_file() {
    let file = write_config(
        r#"
[historian]
base_url = "http://historian.plant.local:4511"
dataset = "Line Data"
timeout_secs = 20
max_retries = 5

[spc]
min_points_for_rules = 25
max_violation_details_per_rule = 5

[batch]
strict_ambiguity = true

[shifts]
day_start_hour = 7
night_start_hour = 19

[sites.Site9]
filling_lines = ["fillingline01"]
tanks = ["tank01", "tank02"]
"#,
    );

    let config = PlantConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.historian.base_url, "http://historian.plant.local:4511");
    assert_eq!(config.historian.dataset, "Line Data");
    assert_eq!(config.historian.max_retries, 5);
    assert_eq!(config.spc.min_points_for_rules, 25);
    assert_eq!(config.spc.max_violation_details_per_rule, 5);
    assert!(config.batch.strict_ambiguity);
    assert_eq!(config.shifts.day_start_hour, 7);

    // A [sites] table replaces the built-in site list
    assert_eq!(config.sites.len(), 1);
    let site = config.site("Enterprise B/Site9").unwrap();
    assert_eq!(site.tanks, vec!["tank01", "tank02"]);
    assert!(site.vats.is_empty());
    assert!(config.site("Enterprise B/Site1").is_none());
}

#[test]
fn missing_file_is_io_error() {
    let err = PlantConfig::load_from_file(std::path::Path::new("/nonexistent/plantwatch.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn malformed_toml_reports_the_path() {
    let file = write_config("[spc\nmin_points_for_rules = 20");
    let err = PlantConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other}"),
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn inverted_shift_hours_are_rejected() {
    let file = write_config(
        r#"
[shifts]
day_start_hour = 18
night_start_hour = 6
"#,
    );
    let err = PlantConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.contains("day_start_hour")), "{errors:?}");
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn site_without_equipment_is_rejected() {
    let file = write_config("[sites.Empty]\n");
    let err = PlantConfig::load_from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("sites.Empty"));
}

#[test]
fn non_http_historian_is_rejected() {
    let file = write_config("[historian]\nbase_url = \"ftp://historian\"\n");
    assert!(matches!(
        PlantConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn typos_warn_but_still_load() {
    let toml_str = r#"
[spc]
min_point_for_rules = 30

[sites.Site1]
filling_lines = ["fillingline01"]
vatz = ["vat01"]
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2, "{warnings:?}");
    let suggestions: Vec<&str> = warnings
        .iter()
        .filter_map(|w| w.suggestion.as_deref())
        .collect();
    assert!(suggestions.contains(&"spc.min_points_for_rules"));
    assert!(suggestions.contains(&"sites.Site1.vats"));

    // The misspelled key falls back to its default
    let config = PlantConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.spc.min_points_for_rules, 20);
}

#[test]
fn short_rule_minimum_is_only_a_warning() {
    let config = PlantConfig::from_toml_str("[spc]\nmin_points_for_rules = 10\n").unwrap();
    let (errors, warnings) = validate_plausible_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "spc.min_points_for_rules"));
}

#[test]
fn effective_config_round_trips() {
    let original = PlantConfig::default();
    let parsed = PlantConfig::from_toml_str(&original.to_toml().unwrap()).unwrap();
    assert_eq!(parsed.sites, original.sites);
    assert_eq!(parsed.historian.batch_size, original.historian.batch_size);
    assert_eq!(parsed.spc.artifact_boundary_secs, 300);
}
