//! Evaluation report produced by the external evaluator.
//!
//! Only the fields the claim pipeline reads are modelled; anything else the
//! evaluator emits is ignored on load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ClaimError, Result};

/// Remaining benchmark gaps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BenchmarkGaps {
    pub remaining_distance: u32,
}

/// Observed benchmark state for the evaluated system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkProgress {
    pub suite_id: String,
    pub observed: BTreeMap<String, f64>,
    pub gaps: BenchmarkGaps,
    pub ready: bool,
}

/// Which scoring protocol produced the observed metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkProvenance {
    pub scoring_reference: String,
}

/// Calibration signals for external claims. Both are optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClaimCalibration {
    #[serde(default)]
    pub combined_average_reality_score: Option<f64>,
    #[serde(default)]
    pub public_overclaim_rate: Option<f64>,
}

/// The evaluation report consumed by comparison, release status and planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub benchmark_progress: BenchmarkProgress,
    pub benchmark_provenance: BenchmarkProvenance,
    #[serde(default)]
    pub claim_calibration: ClaimCalibration,
}

impl EvalReport {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| ClaimError::input(path.display(), format!("cannot read eval report: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClaimError::input(path.display(), format!("malformed eval report: {e}")))
    }

    pub fn suite_id(&self) -> &str {
        &self.benchmark_progress.suite_id
    }

    pub fn scoring_reference(&self) -> &str {
        &self.benchmark_provenance.scoring_reference
    }

    pub fn observed(&self) -> &BTreeMap<String, f64> {
        &self.benchmark_progress.observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_report_and_ignores_extra_fields() {
        let report: EvalReport = serde_json::from_value(json!({
            "benchmark_progress": {
                "suite_id": "s1",
                "observed": {"quality": 0.9},
                "gaps": {"remaining_distance": 2, "notes": "ignored"},
                "ready": false
            },
            "benchmark_provenance": {"scoring_reference": "rubric-v2"},
            "dialogue": {"turns": 12}
        }))
        .unwrap();
        assert_eq!(report.suite_id(), "s1");
        assert_eq!(report.scoring_reference(), "rubric-v2");
        assert_eq!(report.benchmark_progress.gaps.remaining_distance, 2);
        assert!(report.claim_calibration.public_overclaim_rate.is_none());
    }

    #[test]
    fn missing_suite_id_is_an_error() {
        let result: std::result::Result<EvalReport, _> = serde_json::from_value(json!({
            "benchmark_progress": {"observed": {}, "gaps": {"remaining_distance": 0}, "ready": true},
            "benchmark_provenance": {"scoring_reference": "r"}
        }));
        assert!(result.is_err());
    }
}
