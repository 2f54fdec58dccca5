//! Campaign replay against one registry file.
//!
//! Order: every ingest payload, then every baseline run (normalize when a
//! patch is given, then attest). A failing step is recorded and the replay
//! moves on; a baseline whose normalization failed is not attested.
//!
//! Replay writes to whatever path it is given. Projection callers hand it a
//! sandbox copy; only promotion execute hands it the source.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::eval::EvalReport;
use crate::quality_gates::attestation::{attest_file, AttestOptions, AttestationReport};
use crate::quality_gates::ingestion::{ingest_payload_file, IngestionReport};
use crate::quality_gates::normalization::{normalize_file, NormalizationReport, NormalizeOptions};
use crate::staging::{BaselineRun, CampaignConfig};

/// Aggregate outcome of a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Every step succeeded.
    Ok,
    /// Some steps succeeded.
    Partial,
    /// No step succeeded, or the campaign was refused.
    Error,
}

impl StageStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, StageStatus::Ok)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Ok => "ok",
            StageStatus::Partial => "partial",
            StageStatus::Error => "error",
        }
    }

    fn from_counts(succeeded: usize, total: usize) -> Self {
        if succeeded == total {
            StageStatus::Ok
        } else if succeeded > 0 {
            StageStatus::Partial
        } else {
            StageStatus::Error
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepReport {
    Ingest(IngestionReport),
    Normalize(NormalizationReport),
    Attest(AttestationReport),
    Skipped { baseline_id: String, reason: String },
}

impl StepReport {
    /// A failed attestation counts as a failed step.
    pub fn succeeded(&self) -> bool {
        match self {
            StepReport::Ingest(r) => r.status.is_ok(),
            StepReport::Normalize(r) => r.status.is_ok(),
            StepReport::Attest(r) => r.status.is_ok() && r.passed,
            StepReport::Skipped { .. } => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepReport::Ingest(_) => "ingest",
            StepReport::Normalize(_) => "normalize",
            StepReport::Attest(_) => "attest",
            StepReport::Skipped { .. } => "skipped",
        }
    }

    /// Human-readable failure, if any.
    pub fn failure(&self) -> Option<String> {
        if self.succeeded() {
            return None;
        }
        Some(match self {
            StepReport::Ingest(r) => format!(
                "ingest {}: {}",
                r.origin,
                r.reason.as_deref().unwrap_or("rejected")
            ),
            StepReport::Normalize(r) => format!(
                "normalize {}: {}",
                r.baseline_id,
                r.reason.as_deref().unwrap_or("failed")
            ),
            StepReport::Attest(r) => match &r.reason {
                Some(reason) => format!("attest {}: {reason}", r.baseline_id),
                None => format!("attest {}: {}", r.baseline_id, r.reasons.join("; ")),
            },
            StepReport::Skipped {
                baseline_id,
                reason,
            } => format!("skipped {baseline_id}: {reason}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub stage_status: StageStatus,
    pub steps: Vec<StepReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReplayOutcome {
    pub fn failures(&self) -> Vec<String> {
        self.steps.iter().filter_map(StepReport::failure).collect()
    }
}

fn replay_run(registry_path: &Path, run: &BaselineRun, eval: &EvalReport, steps: &mut Vec<StepReport>) {
    if let Some(patch_path) = &run.patch_overrides_path {
        let opts = NormalizeOptions {
            align_to: run.align_to_eval.then_some(eval),
            replace_metrics: run.replace_metrics,
            dry_run: run.dry_run,
        };
        let report = normalize_file(registry_path, &run.baseline_id, Some(patch_path), &opts);
        let ok = report.status.is_ok();
        steps.push(StepReport::Normalize(report));
        if !ok {
            steps.push(StepReport::Skipped {
                baseline_id: run.baseline_id.clone(),
                reason: "attestation skipped because normalization failed".to_string(),
            });
            return;
        }
    }
    let opts = AttestOptions {
        max_metric_delta: run.max_metric_delta,
        dry_run: run.dry_run,
    };
    steps.push(StepReport::Attest(attest_file(
        registry_path,
        &run.baseline_id,
        eval,
        &opts,
    )));
}

/// Replay `campaign` against the registry at `registry_path`.
pub fn replay_campaign(registry_path: &Path, campaign: &CampaignConfig, eval: &EvalReport) -> ReplayOutcome {
    if let Err(e) = campaign.ensure_unique_runs() {
        return ReplayOutcome {
            stage_status: StageStatus::Error,
            steps: Vec::new(),
            reason: Some(e.to_string()),
        };
    }

    let mut steps = Vec::new();
    for payload in &campaign.ingest_payload_paths {
        steps.push(StepReport::Ingest(ingest_payload_file(
            registry_path,
            payload,
            false,
        )));
    }
    for run in &campaign.baseline_runs {
        replay_run(registry_path, run, eval, &mut steps);
    }

    let succeeded = steps.iter().filter(|s| s.succeeded()).count();
    ReplayOutcome {
        stage_status: StageStatus::from_counts(succeeded, steps.len()),
        steps,
        reason: None,
    }
}
