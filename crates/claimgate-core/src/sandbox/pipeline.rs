//! Sandbox projections: a whole campaign, or one baseline.
//!
//! Both run against a [`RegistrySandbox`] and report the source hash before
//! and after so callers can check the source was never written.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SandboxResult;
use super::registry::{RegistrySandbox, SourceCheck};
use super::replay::{replay_campaign, ReplayOutcome, StageStatus, StepReport};
use crate::comparability::{ComparisonRow, ComparisonSummary};
use crate::domain::eval::EvalReport;
use crate::domain::policy::ReleasePolicy;
use crate::domain::release::{release_status_for, DistanceDelta, DistanceSnapshot, ReleaseStatus};
use crate::obs;
use crate::quality_gates::attestation::{attest_file, AttestOptions, AttestationReport};
use crate::quality_gates::normalization::{normalize_file, NormalizationReport, NormalizeOptions};
use crate::report::{StepStatus, SANDBOX_DISCLAIMER};
use crate::staging::{BaselineRun, CampaignConfig};

/// Campaign effect measured on a sandbox copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub campaign_digest: String,
    pub replay: ReplayOutcome,
    pub before: DistanceSnapshot,
    pub after: DistanceSnapshot,
    pub delta: DistanceDelta,
    pub release_status_after: ReleaseStatus,
    pub comparison_after: ComparisonSummary,
    pub source: SourceCheck,
}

/// Replay `campaign` on a sandbox copy of `source` and measure distances.
pub fn project_campaign(
    source: &Path,
    campaign: &CampaignConfig,
    eval: &EvalReport,
    policy: &ReleasePolicy,
) -> SandboxResult<Projection> {
    let campaign_digest = campaign.digest()?;
    let sandbox = RegistrySandbox::create(source)?;

    let (_, status_before) = release_status_for(eval, sandbox.path(), policy);
    let replay = replay_campaign(sandbox.path(), campaign, eval);
    let (comparison_after, status_after) = release_status_for(eval, sandbox.path(), policy);

    let before = status_before.distance();
    let after = status_after.distance();
    let source_check = sandbox.verify_source_untouched()?;
    obs::emit_sandbox_completed(replay.stage_status.as_str(), source_check.source_untouched);

    Ok(Projection {
        campaign_digest,
        delta: DistanceDelta::between(&before, &after),
        before,
        after,
        release_status_after: status_after,
        comparison_after: comparison_after.summary,
        replay,
        source: source_check,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxCampaignReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub source_path: String,
    pub campaign_digest: Option<String>,
    pub stage_status: StageStatus,
    pub steps: Vec<StepReport>,
    pub before: Option<DistanceSnapshot>,
    pub after: Option<DistanceSnapshot>,
    pub delta: Option<DistanceDelta>,
    pub source_sha256_before: Option<String>,
    pub source_sha256_after: Option<String>,
    pub source_untouched: bool,
    pub reasons: Vec<String>,
}

/// Project `campaign` without touching `source`.
pub fn run_campaign(
    source: &Path,
    campaign: &CampaignConfig,
    eval: &EvalReport,
    policy: &ReleasePolicy,
) -> SandboxCampaignReport {
    let mut report = SandboxCampaignReport {
        status: StepStatus::Error,
        disclaimer: SANDBOX_DISCLAIMER.to_string(),
        source_path: source.display().to_string(),
        campaign_digest: None,
        stage_status: StageStatus::Error,
        steps: Vec::new(),
        before: None,
        after: None,
        delta: None,
        source_sha256_before: None,
        source_sha256_after: None,
        source_untouched: true,
        reasons: Vec::new(),
    };
    let projection = match project_campaign(source, campaign, eval, policy) {
        Ok(p) => p,
        Err(e) => {
            report.reasons.push(e.to_string());
            return report;
        }
    };

    report.reasons = projection.replay.failures();
    if let Some(reason) = &projection.replay.reason {
        report.reasons.push(reason.clone());
    }
    if !projection.source.source_untouched {
        report
            .reasons
            .push("source registry changed during the sandbox run".to_string());
    }
    report.status = if projection.source.source_untouched && projection.replay.reason.is_none() {
        StepStatus::Ok
    } else {
        StepStatus::Error
    };
    report.campaign_digest = Some(projection.campaign_digest);
    report.stage_status = projection.replay.stage_status;
    report.steps = projection.replay.steps;
    report.before = Some(projection.before);
    report.after = Some(projection.after);
    report.delta = Some(projection.delta);
    report.source_sha256_before = Some(projection.source.source_sha256_before);
    report.source_sha256_after = Some(projection.source.source_sha256_after);
    report.source_untouched = projection.source.source_untouched;
    report
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxPipelineReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub baseline_id: String,
    pub row_before: Option<ComparisonRow>,
    pub row_after: Option<ComparisonRow>,
    pub normalization: Option<NormalizationReport>,
    pub attestation: Option<AttestationReport>,
    pub before: Option<DistanceSnapshot>,
    pub after: Option<DistanceSnapshot>,
    pub delta: Option<DistanceDelta>,
    pub source_sha256_before: Option<String>,
    pub source_sha256_after: Option<String>,
    pub source_untouched: bool,
    pub reason: Option<String>,
}

/// Normalize (when `run` carries a patch) and attest one baseline on a
/// sandbox copy of `source`.
pub fn run_baseline_pipeline(
    source: &Path,
    run: &BaselineRun,
    eval: &EvalReport,
    policy: &ReleasePolicy,
) -> SandboxPipelineReport {
    let mut report = SandboxPipelineReport {
        status: StepStatus::Error,
        disclaimer: SANDBOX_DISCLAIMER.to_string(),
        baseline_id: run.baseline_id.clone(),
        row_before: None,
        row_after: None,
        normalization: None,
        attestation: None,
        before: None,
        after: None,
        delta: None,
        source_sha256_before: None,
        source_sha256_after: None,
        source_untouched: true,
        reason: None,
    };
    let sandbox = match RegistrySandbox::create(source) {
        Ok(s) => s,
        Err(e) => {
            report.reason = Some(e.to_string());
            return report;
        }
    };

    let (comparison_before, status_before) = release_status_for(eval, sandbox.path(), policy);
    report.row_before = comparison_before.row(&run.baseline_id).cloned();

    let mut failure = None;
    if let Some(patch_path) = &run.patch_overrides_path {
        let opts = NormalizeOptions {
            align_to: run.align_to_eval.then_some(eval),
            replace_metrics: run.replace_metrics,
            dry_run: run.dry_run,
        };
        let normalization = normalize_file(sandbox.path(), &run.baseline_id, Some(patch_path), &opts);
        if !normalization.status.is_ok() {
            failure = normalization.reason.clone();
        }
        report.normalization = Some(normalization);
    }
    if failure.is_none() {
        let opts = AttestOptions {
            max_metric_delta: run.max_metric_delta,
            dry_run: run.dry_run,
        };
        let attestation = attest_file(sandbox.path(), &run.baseline_id, eval, &opts);
        if !attestation.status.is_ok() {
            failure = attestation.reason.clone();
        }
        report.attestation = Some(attestation);
    }

    let (comparison_after, status_after) = release_status_for(eval, sandbox.path(), policy);
    report.row_after = comparison_after.row(&run.baseline_id).cloned();
    let before = status_before.distance();
    let after = status_after.distance();
    report.delta = Some(DistanceDelta::between(&before, &after));
    report.before = Some(before);
    report.after = Some(after);

    match sandbox.verify_source_untouched() {
        Ok(check) => {
            if !check.source_untouched && failure.is_none() {
                failure = Some("source registry changed during the sandbox run".to_string());
            }
            report.source_untouched = check.source_untouched;
            report.source_sha256_before = Some(check.source_sha256_before);
            report.source_sha256_after = Some(check.source_sha256_after);
        }
        Err(e) => failure = failure.or(Some(e.to_string())),
    }

    obs::emit_sandbox_completed(
        if failure.is_none() { "ok" } else { "error" },
        report.source_untouched,
    );
    report.status = if failure.is_none() {
        StepStatus::Ok
    } else {
        StepStatus::Error
    };
    report.reason = failure;
    report
}
