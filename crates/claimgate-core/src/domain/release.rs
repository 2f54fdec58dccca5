//! Release-status decision and claim distances.
//!
//! [`ReleaseStatusEvaluator`] turns an evaluation report plus its baseline
//! comparison into the pass/fail gates external claims depend on. The same
//! shape may also be produced by an external tool and loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::comparability::ComparisonReport;
use crate::domain::error::{ClaimError, Result};
use crate::domain::eval::EvalReport;
use crate::domain::policy::ReleasePolicy;

/// Calibration metrics checked by the calibration gate.
pub const CALIBRATION_METRICS: [&str; 2] = ["combined_average_reality_score", "public_overclaim_rate"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BenchmarkGate {
    pub pass: bool,
    pub remaining_distance: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalClaimGate {
    #[serde(default)]
    pub pass: bool,
    pub required_external_baselines: u32,
    pub comparable_external_baselines: u32,
    pub external_claim_distance: u32,
    #[serde(default)]
    pub blockers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationGate {
    pub pass: bool,
    pub required: bool,
    #[serde(default)]
    pub min_reality_score: Option<f64>,
    #[serde(default)]
    pub max_public_overclaim_rate: Option<f64>,
    #[serde(default)]
    pub reality_score_gap: f64,
    #[serde(default)]
    pub public_overclaim_rate_gap: f64,
    #[serde(default)]
    pub missing_metrics: Vec<String>,
}

impl CalibrationGate {
    /// Calibration metrics that are missing or short of their threshold.
    pub fn unmet_conditions(&self) -> u32 {
        if !self.required {
            return 0;
        }
        let reality = self.missing_metrics.iter().any(|m| m == CALIBRATION_METRICS[0])
            || self.reality_score_gap > 0.0;
        let overclaim = self.missing_metrics.iter().any(|m| m == CALIBRATION_METRICS[1])
            || self.public_overclaim_rate_gap > 0.0;
        reality as u32 + overclaim as u32
    }

    pub fn max_conditions(&self) -> u32 {
        if self.required {
            CALIBRATION_METRICS.len() as u32
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseGates {
    #[serde(default)]
    pub benchmark_gate: BenchmarkGate,
    pub external_claim_gate: ExternalClaimGate,
    #[serde(default)]
    pub external_claim_calibration_gate: CalibrationGate,
}

/// The release-status decision.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseStatus {
    pub gates: ReleaseGates,
    #[serde(default)]
    pub external_claim_ready: bool,
}

impl ReleaseStatus {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            ClaimError::input(path.display(), format!("cannot read release status: {e}"))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ClaimError::input(path.display(), format!("malformed release status: {e}"))
        })
    }

    pub fn distance(&self) -> DistanceSnapshot {
        DistanceSnapshot::from_status(self)
    }
}

/// Progress ratio `(max - distance) / max`, clamped to [0, 1].
/// A non-positive `max` counts as fully satisfied.
pub fn progress_ratio(distance: u32, max: u32) -> f64 {
    if max == 0 {
        return 1.0;
    }
    ((max as f64 - distance as f64) / max as f64).clamp(0.0, 1.0)
}

/// Claim distances at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSnapshot {
    pub external_claim_distance: u32,
    pub calibration_distance: u32,
    pub total_claim_distance: u32,
    pub max_external_claim_distance: u32,
    pub max_total_distance: u32,
    pub external_progress_ratio: f64,
    pub total_progress_ratio: f64,
    pub comparable_external_baselines: u32,
    pub required_external_baselines: u32,
    pub external_claim_ready: bool,
}

impl DistanceSnapshot {
    pub fn from_status(status: &ReleaseStatus) -> Self {
        let ext = &status.gates.external_claim_gate;
        let cal = &status.gates.external_claim_calibration_gate;
        let external_claim_distance = ext.external_claim_distance;
        let calibration_distance = cal.unmet_conditions();
        let max_external = ext.required_external_baselines;
        let max_total = max_external + cal.max_conditions();
        let total = external_claim_distance + calibration_distance;
        Self {
            external_claim_distance,
            calibration_distance,
            total_claim_distance: total,
            max_external_claim_distance: max_external,
            max_total_distance: max_total,
            external_progress_ratio: progress_ratio(external_claim_distance, max_external),
            total_progress_ratio: progress_ratio(total, max_total),
            comparable_external_baselines: ext.comparable_external_baselines,
            required_external_baselines: ext.required_external_baselines,
            external_claim_ready: status.external_claim_ready,
        }
    }
}

/// Change between two snapshots. Positive reductions mean progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceDelta {
    pub external_claim_distance_reduction: i64,
    pub total_claim_distance_reduction: i64,
    pub external_progress_ratio_gain: f64,
    pub total_progress_ratio_gain: f64,
}

impl DistanceDelta {
    pub fn between(before: &DistanceSnapshot, after: &DistanceSnapshot) -> Self {
        Self {
            external_claim_distance_reduction: before.external_claim_distance as i64
                - after.external_claim_distance as i64,
            total_claim_distance_reduction: before.total_claim_distance as i64
                - after.total_claim_distance as i64,
            external_progress_ratio_gain: after.external_progress_ratio
                - before.external_progress_ratio,
            total_progress_ratio_gain: after.total_progress_ratio - before.total_progress_ratio,
        }
    }
}

/// Computes [`ReleaseStatus`] from an evaluation and its comparison.
pub struct ReleaseStatusEvaluator<'a> {
    policy: &'a ReleasePolicy,
}

impl<'a> ReleaseStatusEvaluator<'a> {
    pub fn new(policy: &'a ReleasePolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, eval: &EvalReport, comparison: &ComparisonReport) -> ReleaseStatus {
        let benchmark_gate = BenchmarkGate {
            pass: eval.benchmark_progress.ready,
            remaining_distance: eval.benchmark_progress.gaps.remaining_distance,
        };
        let external_claim_gate = self.external_claim_gate(comparison);
        let calibration = self.calibration_gate(eval);
        let external_claim_ready = external_claim_gate.pass && calibration.pass;

        ReleaseStatus {
            gates: ReleaseGates {
                benchmark_gate,
                external_claim_gate,
                external_claim_calibration_gate: calibration,
            },
            external_claim_ready,
        }
    }

    fn external_claim_gate(&self, comparison: &ComparisonReport) -> ExternalClaimGate {
        let required = self.policy.required_external_baselines;
        let comparable = comparison.summary.comparable_external_baselines;
        let distance = required.saturating_sub(comparable);

        let mut blockers: Vec<String> = comparison
            .external_rows()
            .filter(|r| !r.is_comparable())
            .map(|r| {
                let reasons: Vec<String> = r
                    .comparability
                    .reasons
                    .iter()
                    .map(|x| x.to_string())
                    .collect();
                format!("{}: {}", r.baseline_id, reasons.join("; "))
            })
            .collect();
        if distance > 0 {
            blockers.push(format!(
                "insufficient comparable external baselines (have {comparable}, need {required})"
            ));
        }

        ExternalClaimGate {
            pass: distance == 0,
            required_external_baselines: required,
            comparable_external_baselines: comparable,
            external_claim_distance: distance,
            blockers,
        }
    }

    fn calibration_gate(&self, eval: &EvalReport) -> CalibrationGate {
        let cal = &eval.claim_calibration;
        let mut missing_metrics = Vec::new();

        let reality_score_gap = match cal.combined_average_reality_score {
            Some(score) => (self.policy.min_reality_score - score).max(0.0),
            None => {
                missing_metrics.push(CALIBRATION_METRICS[0].to_string());
                0.0
            }
        };
        let public_overclaim_rate_gap = match cal.public_overclaim_rate {
            Some(rate) => (rate - self.policy.max_public_overclaim_rate).max(0.0),
            None => {
                missing_metrics.push(CALIBRATION_METRICS[1].to_string());
                0.0
            }
        };

        let required = self.policy.require_calibration;
        let satisfied =
            missing_metrics.is_empty() && reality_score_gap <= 0.0 && public_overclaim_rate_gap <= 0.0;

        CalibrationGate {
            pass: !required || satisfied,
            required,
            min_reality_score: Some(self.policy.min_reality_score),
            max_public_overclaim_rate: Some(self.policy.max_public_overclaim_rate),
            reality_score_gap,
            public_overclaim_rate_gap,
            missing_metrics,
        }
    }
}

/// Compare `eval` against `registry_path` and evaluate its release status.
pub fn release_status_for(
    eval: &EvalReport,
    registry_path: &Path,
    policy: &ReleasePolicy,
) -> (ComparisonReport, ReleaseStatus) {
    let comparison = crate::comparability::compare_path(eval, registry_path);
    let status = ReleaseStatusEvaluator::new(policy).evaluate(eval, &comparison);
    (comparison, status)
}
