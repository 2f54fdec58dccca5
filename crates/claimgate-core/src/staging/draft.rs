//! Draft stage: resolve a plan into a concrete [`CampaignConfig`].
//!
//! Every plan row becomes a baseline run. Rows that need a manual patch
//! but have no usable patch file are reported as unresolved dependencies,
//! never silently skipped. So is an ingest-payload list shorter than the
//! number of baselines the plan says must still be sourced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{BaselineRun, CampaignConfig, StagingLayout};
use crate::domain::error::Result;
use crate::obs;
use crate::planner::ClaimPlan;
use crate::quality_gates::attestation::DEFAULT_MAX_METRIC_DELTA;
use crate::report::{write_json_file, STAGING_DISCLAIMER};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftOptions {
    pub align_to_eval: bool,
    pub replace_metrics: bool,
    pub max_metric_delta: f64,
    pub dry_run: bool,
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self {
            align_to_eval: true,
            replace_metrics: false,
            max_metric_delta: DEFAULT_MAX_METRIC_DELTA,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// No patch file is mapped for a row that needs one.
    MissingPatchMapping,
    /// A mapped patch file does not exist.
    MissingPatchFile,
    /// A listed ingest payload does not exist.
    MissingIngestPayload,
    /// Fewer ingest payloads than baselines still to be sourced.
    InsufficientIngestPayloads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedDependency {
    pub kind: DependencyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Ready,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftReport {
    pub status: DraftStatus,
    pub disclaimer: String,
    pub campaign_path: Option<PathBuf>,
    pub campaign_digest: String,
    pub campaign: CampaignConfig,
    pub unresolved_dependencies: Vec<UnresolvedDependency>,
}

impl DraftReport {
    pub fn is_ready(&self) -> bool {
        self.status == DraftStatus::Ready
    }
}

/// Resolve `plan` into a campaign. Pure apart from checking that the
/// referenced files exist.
pub fn draft(
    plan: &ClaimPlan,
    patch_overrides: &BTreeMap<String, PathBuf>,
    ingest_payload_paths: &[PathBuf],
    opts: &DraftOptions,
) -> Result<DraftReport> {
    let mut unresolved = Vec::new();
    let mut campaign = CampaignConfig::default();

    for path in ingest_payload_paths {
        if path.is_file() {
            campaign.ingest_payload_paths.push(path.clone());
        } else {
            unresolved.push(UnresolvedDependency {
                kind: DependencyKind::MissingIngestPayload,
                baseline_id: None,
                detail: format!("ingest payload not found: {}", path.display()),
            });
        }
    }
    let provided = campaign.ingest_payload_paths.len() as u32;
    if provided < plan.additional_baselines_needed {
        unresolved.push(UnresolvedDependency {
            kind: DependencyKind::InsufficientIngestPayloads,
            baseline_id: None,
            detail: format!(
                "plan needs {} additional baseline(s) but {provided} ingest payload(s) are staged",
                plan.additional_baselines_needed
            ),
        });
    }

    for row in &plan.row_plans {
        let mut run = BaselineRun {
            baseline_id: row.baseline_id.clone(),
            patch_overrides_path: None,
            align_to_eval: opts.align_to_eval,
            replace_metrics: opts.replace_metrics,
            max_metric_delta: opts.max_metric_delta,
            dry_run: opts.dry_run,
        };
        if row.needs_manual_patch() {
            match patch_overrides.get(&row.baseline_id) {
                None => {
                    unresolved.push(UnresolvedDependency {
                        kind: DependencyKind::MissingPatchMapping,
                        baseline_id: Some(row.baseline_id.clone()),
                        detail: "row needs a manual patch but none is mapped".to_string(),
                    });
                    continue;
                }
                Some(path) if !path.is_file() => {
                    unresolved.push(UnresolvedDependency {
                        kind: DependencyKind::MissingPatchFile,
                        baseline_id: Some(row.baseline_id.clone()),
                        detail: format!("patch file not found: {}", path.display()),
                    });
                    continue;
                }
                Some(path) => run.patch_overrides_path = Some(path.clone()),
            }
        }
        campaign.baseline_runs.push(run);
    }

    let status = if unresolved.is_empty() {
        DraftStatus::Ready
    } else {
        DraftStatus::Unresolved
    };
    Ok(DraftReport {
        status,
        disclaimer: STAGING_DISCLAIMER.to_string(),
        campaign_path: None,
        campaign_digest: campaign.digest()?,
        campaign,
        unresolved_dependencies: unresolved,
    })
}

/// Load `patch_overrides.json` (baseline_id → patch path).
pub fn load_patch_overrides(path: &Path) -> Result<BTreeMap<String, PathBuf>> {
    crate::report::read_json(path)
}

/// Draft and write `campaign.json` plus `draft.json`.
pub fn write_draft(
    plan: &ClaimPlan,
    patch_overrides: &BTreeMap<String, PathBuf>,
    ingest_payload_paths: &[PathBuf],
    opts: &DraftOptions,
    layout: &StagingLayout,
) -> Result<DraftReport> {
    let mut report = draft(plan, patch_overrides, ingest_payload_paths, opts)?;
    let campaign_path = layout.campaign();
    write_json_file(&campaign_path, &report.campaign)?;
    report.campaign_path = Some(campaign_path);
    write_json_file(&layout.draft(), &report)?;
    let status = match report.status {
        DraftStatus::Ready => "ready",
        DraftStatus::Unresolved => "unresolved",
    };
    obs::emit_stage_completed("draft", status, report.campaign.baseline_runs.len());
    Ok(report)
}
