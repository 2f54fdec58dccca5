//! Gap planner.
//!
//! Turns a comparison plus a release-status decision into a remediation
//! plan. Each non-comparable external baseline gets a short, deterministic
//! action list from a fixed decision table; the plan then projects how far
//! those actions can move the external claim distance and how many new
//! baselines must still be sourced.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::comparability::{compare_path, ComparisonReport, ComparisonRow, ComparisonStatus, Reason};
use crate::domain::eval::EvalReport;
use crate::domain::release::{progress_ratio, ReleaseStatus, CALIBRATION_METRICS};
use crate::obs;
use crate::report::{StepStatus, PLAN_DISCLAIMER};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Row-level remediation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RefreshEvidencePayload,
    ReplacePlaceholderMetadata,
    NormalizeMetadataDates,
    NormalizeHarnessAlignment,
    AddOverlappingMetrics,
    IncreaseMetricOverlap,
    AttestBaseline,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::RefreshEvidencePayload => "refresh_evidence_payload",
            ActionType::ReplacePlaceholderMetadata => "replace_placeholder_metadata",
            ActionType::NormalizeMetadataDates => "normalize_metadata_dates",
            ActionType::NormalizeHarnessAlignment => "normalize_harness_alignment",
            ActionType::AddOverlappingMetrics => "add_overlapping_metrics",
            ActionType::IncreaseMetricOverlap => "increase_metric_overlap",
            ActionType::AttestBaseline => "attest_baseline",
        }
    }

    /// Actions that need a human-supplied patch before they can run.
    pub fn is_manual_patch(self) -> bool {
        !matches!(self, ActionType::AttestBaseline)
    }

    fn command_hint(self, baseline_id: &str) -> String {
        match self {
            ActionType::RefreshEvidencePayload => {
                format!("claimgate ingest --payload <{baseline_id}.payload.json>")
            }
            ActionType::AttestBaseline => {
                format!("claimgate attest --baseline-id {baseline_id} --max-metric-delta 0.02")
            }
            ActionType::NormalizeHarnessAlignment => {
                format!("claimgate normalize --baseline-id {baseline_id} --align-to-eval")
            }
            _ => format!(
                "claimgate normalize --baseline-id {baseline_id} --patch patches/{baseline_id}.patch.json"
            ),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// 1-based within the row.
    pub priority: u32,
    pub action_type: ActionType,
    pub command_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPlan {
    pub baseline_id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub reasons: Vec<Reason>,
    pub actions: Vec<PlannedAction>,
}

impl RowPlan {
    pub fn needs_manual_patch(&self) -> bool {
        self.actions.iter().any(|a| a.action_type.is_manual_patch())
    }

    pub fn has_action(&self, action_type: ActionType) -> bool {
        self.actions.iter().any(|a| a.action_type == action_type)
    }
}

/// Plan-level remediation step that is not tied to one baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityActionType {
    SourceAdditionalBaselines,
    AddCalibrationMetrics,
    ImproveRealityScore,
    ReducePublicOverclaimRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityAction {
    pub action_type: PriorityActionType,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceProgress {
    pub current_external_claim_distance: u32,
    pub projected_external_claim_distance: u32,
    pub max_external_claim_distance: u32,
    pub current_total_distance: u32,
    pub projected_total_distance: u32,
    pub max_total_distance: u32,
    pub current_progress_ratio: f64,
    pub projected_progress_ratio: f64,
}

/// Output of [`plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPlan {
    pub status: StepStatus,
    pub disclaimer: String,
    pub suite_id: String,
    pub row_plans: Vec<RowPlan>,
    pub recoverable_external_rows: u32,
    pub estimated_distance_after_recoverable_actions: u32,
    pub additional_baselines_needed: u32,
    pub priority_actions: Vec<PriorityAction>,
    pub distance_progress: DistanceProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ClaimPlan {
    pub fn row(&self, baseline_id: &str) -> Option<&RowPlan> {
        self.row_plans.iter().find(|r| r.baseline_id == baseline_id)
    }
}

// ---------------------------------------------------------------------------
// Decision table
// ---------------------------------------------------------------------------

/// Ordered actions for one row's reasons. Empty for disabled rows.
pub fn actions_for(reasons: &[Reason]) -> Vec<ActionType> {
    if reasons.contains(&Reason::Disabled) {
        return Vec::new();
    }
    let mut actions: Vec<ActionType> = Vec::new();
    let mut push = |a: ActionType| {
        if !actions.contains(&a) {
            actions.push(a);
        }
    };
    if reasons
        .iter()
        .any(|r| matches!(r, Reason::MissingEvidence(_) | Reason::PlaceholderEvidence(_)))
    {
        push(ActionType::RefreshEvidencePayload);
        push(ActionType::ReplacePlaceholderMetadata);
    }
    if reasons.iter().any(|r| matches!(r, Reason::InvalidDate(_))) {
        push(ActionType::NormalizeMetadataDates);
    }
    if reasons
        .iter()
        .any(|r| matches!(r, Reason::SuiteMismatch { .. } | Reason::ScoringMismatch { .. }))
    {
        push(ActionType::NormalizeHarnessAlignment);
    }
    if reasons.contains(&Reason::NoMetrics) {
        push(ActionType::AddOverlappingMetrics);
    }
    if reasons.contains(&Reason::NoOverlap) {
        push(ActionType::IncreaseMetricOverlap);
    }
    push(ActionType::AttestBaseline);
    actions
}

fn row_plan(row: &ComparisonRow) -> Option<RowPlan> {
    let actions = actions_for(&row.comparability.reasons);
    if actions.is_empty() {
        return None;
    }
    Some(RowPlan {
        baseline_id: row.baseline_id.clone(),
        label: row.label.clone(),
        reasons: row.comparability.reasons.clone(),
        actions: actions
            .into_iter()
            .enumerate()
            .map(|(i, a)| PlannedAction {
                priority: i as u32 + 1,
                action_type: a,
                command_hint: a.command_hint(&row.baseline_id),
            })
            .collect(),
    })
}

fn calibration_actions(status: &ReleaseStatus) -> Vec<PriorityAction> {
    let cal = &status.gates.external_claim_calibration_gate;
    let mut out = Vec::new();
    if !cal.required || cal.pass {
        return out;
    }
    if !cal.missing_metrics.is_empty() {
        out.push(PriorityAction {
            action_type: PriorityActionType::AddCalibrationMetrics,
            detail: format!("report missing calibration metrics: {}", cal.missing_metrics.join(", ")),
        });
    }
    if cal.reality_score_gap > 0.0 {
        out.push(PriorityAction {
            action_type: PriorityActionType::ImproveRealityScore,
            detail: format!(
                "raise {} by {:.4} to reach {}",
                CALIBRATION_METRICS[0],
                cal.reality_score_gap,
                cal.min_reality_score.map(|v| v.to_string()).unwrap_or_default()
            ),
        });
    }
    if cal.public_overclaim_rate_gap > 0.0 {
        out.push(PriorityAction {
            action_type: PriorityActionType::ReducePublicOverclaimRate,
            detail: format!(
                "lower {} by {:.4} to reach {}",
                CALIBRATION_METRICS[1],
                cal.public_overclaim_rate_gap,
                cal.max_public_overclaim_rate
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            ),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Build a plan from an existing comparison.
pub fn plan(eval: &EvalReport, status: &ReleaseStatus, comparison: &ComparisonReport) -> ClaimPlan {
    let snapshot = status.distance();
    let mut row_plans = Vec::new();
    if comparison.status != ComparisonStatus::Error {
        row_plans = comparison
            .external_rows()
            .filter(|r| !r.is_comparable())
            .filter_map(row_plan)
            .collect();
    }

    let recoverable = row_plans.iter().filter(|r| !r.actions.is_empty()).count() as u32;
    let current_external = snapshot.external_claim_distance;
    let projected_external = current_external.saturating_sub(recoverable);
    let additional_baselines_needed = projected_external;

    let mut priority_actions = Vec::new();
    if additional_baselines_needed > 0 {
        priority_actions.push(PriorityAction {
            action_type: PriorityActionType::SourceAdditionalBaselines,
            detail: format!(
                "source {additional_baselines_needed} more external baseline(s) with citable evidence for suite {}",
                eval.suite_id()
            ),
        });
    }
    priority_actions.extend(calibration_actions(status));

    let projected_total = projected_external + snapshot.calibration_distance;
    let distance_progress = DistanceProgress {
        current_external_claim_distance: current_external,
        projected_external_claim_distance: projected_external,
        max_external_claim_distance: snapshot.max_external_claim_distance,
        current_total_distance: snapshot.total_claim_distance,
        projected_total_distance: projected_total,
        max_total_distance: snapshot.max_total_distance,
        current_progress_ratio: snapshot.total_progress_ratio,
        projected_progress_ratio: progress_ratio(projected_total, snapshot.max_total_distance),
    };

    obs::emit_plan_built(row_plans.len(), recoverable, additional_baselines_needed);

    let (status, reason) = match comparison.status {
        ComparisonStatus::Error => (StepStatus::Error, comparison.reason.clone()),
        _ => (StepStatus::Ok, None),
    };
    ClaimPlan {
        status,
        disclaimer: PLAN_DISCLAIMER.to_string(),
        suite_id: eval.suite_id().to_string(),
        row_plans,
        recoverable_external_rows: recoverable,
        estimated_distance_after_recoverable_actions: projected_external,
        additional_baselines_needed,
        priority_actions,
        distance_progress,
        reason,
    }
}

/// Compare `eval` with the registry at `registry_path` and plan from it.
pub fn plan_for_registry(eval: &EvalReport, status: &ReleaseStatus, registry_path: &Path) -> ClaimPlan {
    let comparison = compare_path(eval, registry_path);
    plan(eval, status, &comparison)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unverified_only_gets_attest_only() {
        let actions = actions_for(&[Reason::Unverified]);
        assert_eq!(actions, vec![ActionType::AttestBaseline]);
    }

    #[test]
    fn decision_table_order_is_fixed() {
        let reasons = vec![
            Reason::NoOverlap,
            Reason::ScoringMismatch {
                baseline: "a".into(),
                report: "b".into(),
            },
            Reason::InvalidDate("source_date".into()),
            Reason::PlaceholderEvidence("citation".into()),
            Reason::MissingEvidence("artifact_hash".into()),
            Reason::Unverified,
        ];
        assert_eq!(
            actions_for(&reasons),
            vec![
                ActionType::RefreshEvidencePayload,
                ActionType::ReplacePlaceholderMetadata,
                ActionType::NormalizeMetadataDates,
                ActionType::NormalizeHarnessAlignment,
                ActionType::IncreaseMetricOverlap,
                ActionType::AttestBaseline,
            ]
        );
    }

    #[test]
    fn disabled_rows_are_skipped() {
        assert!(actions_for(&[Reason::Disabled, Reason::Unverified]).is_empty());
    }

    #[test]
    fn manual_patch_classification() {
        assert!(ActionType::NormalizeMetadataDates.is_manual_patch());
        assert!(!ActionType::AttestBaseline.is_manual_patch());
    }

    #[test]
    fn action_types_serialize_snake_case() {
        let v = serde_json::to_value(ActionType::IncreaseMetricOverlap).unwrap();
        assert_eq!(v, serde_json::json!("increase_metric_overlap"));
        assert_eq!(ActionType::IncreaseMetricOverlap.to_string(), "increase_metric_overlap");
    }
}
