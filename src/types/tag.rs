//! Tag path classification
//!
//! Tag paths follow `Enterprise/Site/Area/Line/Equipment/metric-or-processdata/.../field`
//! and are otherwise opaque keys. The only semantics taken from a path is
//! which analysis family a tag belongs to, decided once by suffix matching.

use serde::{Deserialize, Serialize};

/// Cumulative counter fields (delta = last - first over the window)
pub const COUNTER_FIELDS: &[&str] = &[
    "timerunning",
    "timeidle",
    "timedownplanned",
    "timedownunplanned",
    "countinfeed",
    "countoutfeed",
    "countdefect",
];

/// Instantaneous rate fields (latest value matters)
pub const RATE_FIELDS: &[&str] = &["rateactual", "ratestandard"];

/// Vessel that owns a weight tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vessel {
    /// Batch vat: phase segmentation and artifact annotation apply
    Vat,
    /// Storage tank: never phase-annotated, never escalates quality flags
    StorageTank,
    Other,
}

/// Analysis family of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "family", content = "vessel")]
pub enum TagKind {
    Counter,
    Rate,
    Weight(Vessel),
    Unknown,
}

impl TagKind {
    /// Classify a tag path by its last segment.
    pub fn classify(tag: &str) -> Self {
        let mut segments = tag.trim_end_matches('/').rsplit('/');
        let field = segments.next().unwrap_or_default().to_ascii_lowercase();

        if COUNTER_FIELDS.contains(&field.as_str()) {
            return Self::Counter;
        }
        if RATE_FIELDS.contains(&field.as_str()) {
            return Self::Rate;
        }
        if field == "weight" {
            return Self::Weight(Self::vessel_of(tag));
        }
        Self::Unknown
    }

    fn vessel_of(tag: &str) -> Vessel {
        let mut vessel = Vessel::Other;
        for segment in tag.split('/') {
            let s = segment.to_ascii_lowercase();
            if s.starts_with("vat") {
                vessel = Vessel::Vat;
            } else if s.starts_with("tank") || s.starts_with("storage") {
                return Vessel::StorageTank;
            }
        }
        vessel
    }

    pub fn is_vat_weight(&self) -> bool {
        matches!(self, Self::Weight(Vessel::Vat))
    }

    pub fn is_storage_tank(&self) -> bool {
        matches!(self, Self::Weight(Vessel::StorageTank))
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Rate => write!(f, "rate"),
            Self::Weight(Vessel::Vat) => write!(f, "vat weight"),
            Self::Weight(Vessel::StorageTank) => write!(f, "tank weight"),
            Self::Weight(Vessel::Other) => write!(f, "weight"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_and_rate_suffixes() {
        let line = "Enterprise B/Site1/fillerproduction/fillingline01";
        assert_eq!(
            TagKind::classify(&format!("{line}/metric/input/timerunning")),
            TagKind::Counter
        );
        assert_eq!(
            TagKind::classify(&format!("{line}/metric/input/countoutfeed")),
            TagKind::Counter
        );
        assert_eq!(
            TagKind::classify(&format!("{line}/metric/input/rateactual")),
            TagKind::Rate
        );
    }

    #[test]
    fn test_vat_weight() {
        let tag = "Enterprise B/Site1/liquidprocessing/mixroom01/vat01/processdata/process/weight";
        assert_eq!(TagKind::classify(tag), TagKind::Weight(Vessel::Vat));
        assert!(TagKind::classify(tag).is_vat_weight());
    }

    #[test]
    fn test_tank_weight_is_not_vat() {
        let tag = "Enterprise B/Site1/liquidprocessing/storage/tank02/processdata/process/weight";
        let kind = TagKind::classify(tag);
        assert!(kind.is_storage_tank());
        assert!(!kind.is_vat_weight());
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            TagKind::classify("Enterprise B/Site1/fillerproduction/fillingline01/metric/oee"),
            TagKind::Unknown
        );
    }
}
