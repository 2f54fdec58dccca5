//! Scaffold stage: patch templates for rows that need a manual patch.
//!
//! A template only carries the fields the row's comparability reasons point
//! at, each as a placeholder (`""` for text, `null` for metrics). Harness
//! identifiers come pre-filled as defaults from the eval report.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::StagingLayout;
use crate::comparability::Reason;
use crate::domain::error::Result;
use crate::domain::eval::EvalReport;
use crate::domain::patch::{BaselinePatch, FieldPatch};
use crate::obs;
use crate::planner::{ClaimPlan, RowPlan};
use crate::report::{write_json_file, StepStatus, STAGING_DISCLAIMER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMapEntry {
    pub patch_path: PathBuf,
    pub defaults: BaselinePatch,
}

/// Payload files to ingest, filled in by whoever sources new baselines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IngestManifest {
    #[serde(default)]
    pub payload_paths: Vec<PathBuf>,
    #[serde(default)]
    pub additional_baselines_needed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub suite_id: String,
    pub defaults: BaselinePatch,
    pub patch_map: BTreeMap<String, PatchMapEntry>,
    /// Rows that only need attestation and therefore get no template.
    pub attest_only: Vec<String>,
    pub ingest_manifest_path: PathBuf,
    pub additional_baselines_needed: u32,
}

/// Defaults every template may draw from.
pub fn harness_defaults(eval: &EvalReport) -> BaselinePatch {
    BaselinePatch {
        suite_id: FieldPatch::Set(eval.suite_id().to_string()),
        scoring_protocol: FieldPatch::Set(eval.scoring_reference().to_string()),
        ..BaselinePatch::default()
    }
}

/// Template for one row, holding only the fields its reasons point at.
pub fn template_for(row: &RowPlan, eval: &EvalReport) -> BaselinePatch {
    let mut template = BaselinePatch {
        baseline_id: Some(row.baseline_id.clone()),
        ..BaselinePatch::default()
    };
    for reason in &row.reasons {
        match reason {
            Reason::MissingEvidence(field) | Reason::PlaceholderEvidence(field) => {
                if let Some(slot) = template.evidence.field_mut(field) {
                    *slot = FieldPatch::placeholder();
                }
            }
            Reason::InvalidDate(field) if field == "source_date" => {
                template.source_date = FieldPatch::placeholder();
            }
            Reason::InvalidDate(_) => {
                template.evidence.retrieval_date = FieldPatch::placeholder();
            }
            Reason::SuiteMismatch { .. } => template.suite_id = FieldPatch::placeholder(),
            Reason::ScoringMismatch { .. } => {
                template.scoring_protocol = FieldPatch::placeholder()
            }
            Reason::NoMetrics | Reason::NoOverlap => {
                for name in eval.observed().keys() {
                    template.metrics.insert(name.clone(), FieldPatch::Unset);
                }
            }
            Reason::Disabled | Reason::Unverified | Reason::NotReplicated => {}
        }
    }
    template
}

/// Write templates, `ingest_manifest.json` and `scaffold.json`.
///
/// An existing ingest manifest is kept so already-listed payloads survive a
/// re-run; only its `additional_baselines_needed` is refreshed.
pub fn scaffold(plan: &ClaimPlan, eval: &EvalReport, layout: &StagingLayout) -> Result<ScaffoldReport> {
    let defaults = harness_defaults(eval);
    let mut patch_map = BTreeMap::new();
    let mut attest_only = Vec::new();

    for row in &plan.row_plans {
        if !row.needs_manual_patch() {
            attest_only.push(row.baseline_id.clone());
            continue;
        }
        let path = layout.patch_template(&row.baseline_id);
        write_json_file(&path, &template_for(row, eval))?;
        patch_map.insert(
            row.baseline_id.clone(),
            PatchMapEntry {
                patch_path: path,
                defaults: defaults.clone(),
            },
        );
    }

    let manifest_path = layout.ingest_manifest();
    let mut manifest = if manifest_path.exists() {
        crate::report::read_json::<IngestManifest>(&manifest_path)?
    } else {
        IngestManifest::default()
    };
    manifest.additional_baselines_needed = plan.additional_baselines_needed;
    write_json_file(&manifest_path, &manifest)?;

    let report = ScaffoldReport {
        status: StepStatus::Ok,
        disclaimer: STAGING_DISCLAIMER.to_string(),
        suite_id: eval.suite_id().to_string(),
        defaults,
        patch_map,
        attest_only,
        ingest_manifest_path: manifest_path,
        additional_baselines_needed: plan.additional_baselines_needed,
    };
    write_json_file(&layout.scaffold(), &report)?;
    obs::emit_stage_completed("scaffold", report.status.as_str(), report.patch_map.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlannedAction, ActionType};
    use serde_json::json;

    fn eval() -> EvalReport {
        serde_json::from_value(json!({
            "benchmark_progress": {"suite_id": "s1", "observed": {"quality": 0.9, "coverage": 0.7}, "gaps": {"remaining_distance": 0}, "ready": true},
            "benchmark_provenance": {"scoring_reference": "rubric-v1"}
        }))
        .unwrap()
    }

    fn row(reasons: Vec<Reason>) -> RowPlan {
        let actions = crate::planner::actions_for(&reasons)
            .into_iter()
            .enumerate()
            .map(|(i, a)| PlannedAction {
                priority: i as u32 + 1,
                action_type: a,
                command_hint: String::new(),
            })
            .collect();
        RowPlan {
            baseline_id: "ext-a".to_string(),
            label: None,
            reasons,
            actions,
        }
    }

    #[test]
    fn template_targets_only_reasoned_fields() {
        let r = row(vec![
            Reason::PlaceholderEvidence("citation".into()),
            Reason::InvalidDate("source_date".into()),
            Reason::NoOverlap,
        ]);
        let t = template_for(&r, &eval());
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(
            v,
            json!({
                "baseline_id": "ext-a",
                "source_date": "",
                "evidence": {"citation": ""},
                "metrics": {"coverage": null, "quality": null}
            })
        );
        assert_eq!(t.unresolved_fields().len(), 4);
    }

    #[test]
    fn attest_only_rows_get_no_template() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StagingLayout::new(dir.path());
        let plan_row = row(vec![Reason::Unverified]);
        assert!(!plan_row.has_action(ActionType::RefreshEvidencePayload));
        let plan: ClaimPlan = serde_json::from_value(json!({
            "status": "ok",
            "disclaimer": "",
            "suite_id": "s1",
            "row_plans": [serde_json::to_value(&plan_row).unwrap()],
            "recoverable_external_rows": 1,
            "estimated_distance_after_recoverable_actions": 0,
            "additional_baselines_needed": 0,
            "priority_actions": [],
            "distance_progress": {
                "current_external_claim_distance": 1,
                "projected_external_claim_distance": 0,
                "max_external_claim_distance": 1,
                "current_total_distance": 1,
                "projected_total_distance": 0,
                "max_total_distance": 1,
                "current_progress_ratio": 0.0,
                "projected_progress_ratio": 1.0
            }
        }))
        .unwrap();
        let report = scaffold(&plan, &eval(), &layout).unwrap();
        assert!(report.patch_map.is_empty());
        assert_eq!(report.attest_only, vec!["ext-a"]);
        assert!(layout.scaffold().exists());
        assert!(layout.ingest_manifest().exists());
    }
}
