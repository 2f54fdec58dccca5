//! Claim policy: release-status thresholds and promotion gates.
//!
//! Loaded from an optional JSON file of the form
//! `{"release_policy": {...}, "promotion_gates": {...}}`. Every field has a
//! default, so a missing file or section gives the permissive defaults.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::error::{ClaimError, Result};

/// Ceiling on the external-claim distance left after a promotion.
///
/// Three states keep "no ceiling" apart from "must reach zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceCeiling {
    #[default]
    Unset,
    Zero,
    AtMost(u32),
}

impl DistanceCeiling {
    pub fn from_option(limit: Option<u32>) -> Self {
        match limit {
            None => DistanceCeiling::Unset,
            Some(0) => DistanceCeiling::Zero,
            Some(n) => DistanceCeiling::AtMost(n),
        }
    }

    /// The numeric limit, if any.
    pub fn limit(self) -> Option<u32> {
        match self {
            DistanceCeiling::Unset => None,
            DistanceCeiling::Zero => Some(0),
            DistanceCeiling::AtMost(n) => Some(n),
        }
    }

    /// Whether `distance` satisfies the ceiling.
    pub fn admits(self, distance: u32) -> bool {
        self.limit().map_or(true, |limit| distance <= limit)
    }
}

impl fmt::Display for DistanceCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceCeiling::Unset => f.write_str("unset"),
            DistanceCeiling::Zero => f.write_str("zero"),
            DistanceCeiling::AtMost(n) => write!(f, "at most {n}"),
        }
    }
}

impl Serialize for DistanceCeiling {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.limit().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DistanceCeiling {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<u32>::deserialize(deserializer).map(DistanceCeiling::from_option)
    }
}

/// Thresholds for the release-status decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleasePolicy {
    pub required_external_baselines: u32,
    pub require_calibration: bool,
    pub min_reality_score: f64,
    pub max_public_overclaim_rate: f64,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            required_external_baselines: 1,
            require_calibration: false,
            min_reality_score: 0.7,
            max_public_overclaim_rate: 0.1,
        }
    }
}

/// Gates a projected or executed promotion must pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionGates {
    pub min_distance_reduction: i64,
    pub max_after_external_claim_distance: DistanceCeiling,
    pub require_external_claim_ready: bool,
    pub require_total_distance_non_increase: bool,
    pub min_total_progress_ratio_gain: Option<f64>,
}

impl Default for PromotionGates {
    fn default() -> Self {
        Self {
            min_distance_reduction: 1,
            max_after_external_claim_distance: DistanceCeiling::Unset,
            require_external_claim_ready: false,
            require_total_distance_non_increase: false,
            min_total_progress_ratio_gain: None,
        }
    }
}

/// The full policy document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimPolicy {
    pub release_policy: ReleasePolicy,
    pub promotion_gates: PromotionGates,
}

impl ClaimPolicy {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path)
            .map_err(|e| ClaimError::input(path.display(), format!("cannot read policy: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClaimError::input(path.display(), format!("malformed policy: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_permissive() {
        let gates = PromotionGates::default();
        assert_eq!(gates.min_distance_reduction, 1);
        assert_eq!(gates.max_after_external_claim_distance, DistanceCeiling::Unset);
        assert!(!gates.require_external_claim_ready);
        assert!(!gates.require_total_distance_non_increase);
        assert!(gates.min_total_progress_ratio_gain.is_none());
    }

    #[test]
    fn ceiling_distinguishes_null_zero_and_n() {
        let parse = |v: serde_json::Value| -> PromotionGates {
            serde_json::from_value(json!({ "max_after_external_claim_distance": v })).unwrap()
        };
        assert_eq!(
            parse(json!(null)).max_after_external_claim_distance,
            DistanceCeiling::Unset
        );
        assert_eq!(
            parse(json!(0)).max_after_external_claim_distance,
            DistanceCeiling::Zero
        );
        assert_eq!(
            parse(json!(2)).max_after_external_claim_distance,
            DistanceCeiling::AtMost(2)
        );
    }

    #[test]
    fn ceiling_admits() {
        assert!(DistanceCeiling::Unset.admits(99));
        assert!(DistanceCeiling::Zero.admits(0));
        assert!(!DistanceCeiling::Zero.admits(1));
        assert!(DistanceCeiling::AtMost(2).admits(2));
        assert!(!DistanceCeiling::AtMost(2).admits(3));
    }

    #[test]
    fn partial_policy_file_fills_defaults() {
        let policy: ClaimPolicy = serde_json::from_value(json!({
            "promotion_gates": {"require_external_claim_ready": true}
        }))
        .unwrap();
        assert!(policy.promotion_gates.require_external_claim_ready);
        assert_eq!(policy.promotion_gates.min_distance_reduction, 1);
        assert_eq!(policy.release_policy.required_external_baselines, 1);
    }

    #[test]
    fn missing_policy_path_gives_defaults() {
        assert_eq!(ClaimPolicy::load(None).unwrap(), ClaimPolicy::default());
    }
}
