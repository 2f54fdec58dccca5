//! Promotion: gate evaluation, sandbox preview and confirmed execution.
//!
//! Preview replays a campaign on a sandbox copy and hands back the sha256 of
//! the current registry as the confirmation hash. Execute is the only
//! operation that mutates the authoritative registry: it requires that hash,
//! replays the campaign on the real file, and restores the exact prior bytes
//! unless every promotion gate passes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::digest::sha256_hex;
use crate::domain::eval::EvalReport;
use crate::domain::policy::{ClaimPolicy, PromotionGates};
use crate::domain::registry::write_atomic;
use crate::domain::release::{release_status_for, DistanceDelta, DistanceSnapshot};
use crate::metrics::METRICS;
use crate::obs::{self, PromotionSpan};
use crate::report::{StepStatus, EXECUTE_DISCLAIMER, SANDBOX_DISCLAIMER};
use crate::sandbox::{project_campaign, replay_campaign, StageStatus, StepReport};
use crate::staging::CampaignConfig;

// ---------------------------------------------------------------------------
// Gate rules
// ---------------------------------------------------------------------------

/// A single promotion gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionRule {
    /// The replay's stage status must be `ok`.
    StageStatusOk,
    /// External claim distance must shrink by at least the configured amount.
    MinDistanceReduction,
    /// External claim distance after promotion must respect the ceiling.
    MaxAfterExternalClaimDistance,
    /// The release status after promotion must be claim-ready.
    ExternalClaimReady,
    /// Total claim distance must not grow.
    TotalDistanceNonIncrease,
    /// Total progress ratio must gain at least the configured amount.
    MinTotalProgressRatioGain,
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionViolation {
    pub rule: PromotionRule,
    pub reason: String,
}

/// The outcome of evaluating promotion gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionVerdict {
    pub passed: bool,
    pub checked: Vec<PromotionRule>,
    pub violations: Vec<PromotionViolation>,
}

impl PromotionVerdict {
    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.reason.clone()).collect()
    }
}

/// Evaluate `gates` for a projected or executed campaign.
pub fn evaluate_promotion_gates(
    gates: &PromotionGates,
    stage_status: StageStatus,
    before: &DistanceSnapshot,
    after: &DistanceSnapshot,
) -> PromotionVerdict {
    let delta = DistanceDelta::between(before, after);
    let mut checked = vec![PromotionRule::StageStatusOk, PromotionRule::MinDistanceReduction];
    let mut violations = Vec::new();

    if !stage_status.is_ok() {
        violations.push(PromotionViolation {
            rule: PromotionRule::StageStatusOk,
            reason: format!("stage status is {} (must be ok)", stage_status.as_str()),
        });
    }

    if delta.external_claim_distance_reduction < gates.min_distance_reduction {
        violations.push(PromotionViolation {
            rule: PromotionRule::MinDistanceReduction,
            reason: format!(
                "external claim distance reduction {} is below minimum {} ({} -> {})",
                delta.external_claim_distance_reduction,
                gates.min_distance_reduction,
                before.external_claim_distance,
                after.external_claim_distance
            ),
        });
    }

    if let Some(limit) = gates.max_after_external_claim_distance.limit() {
        checked.push(PromotionRule::MaxAfterExternalClaimDistance);
        if !gates
            .max_after_external_claim_distance
            .admits(after.external_claim_distance)
        {
            violations.push(PromotionViolation {
                rule: PromotionRule::MaxAfterExternalClaimDistance,
                reason: format!(
                    "external claim distance after promotion is {} (ceiling {limit})",
                    after.external_claim_distance
                ),
            });
        }
    }

    if gates.require_external_claim_ready {
        checked.push(PromotionRule::ExternalClaimReady);
        if !after.external_claim_ready {
            violations.push(PromotionViolation {
                rule: PromotionRule::ExternalClaimReady,
                reason: "release status is not external-claim ready after promotion".to_string(),
            });
        }
    }

    if gates.require_total_distance_non_increase {
        checked.push(PromotionRule::TotalDistanceNonIncrease);
        if after.total_claim_distance > before.total_claim_distance {
            violations.push(PromotionViolation {
                rule: PromotionRule::TotalDistanceNonIncrease,
                reason: format!(
                    "total claim distance increased ({} -> {})",
                    before.total_claim_distance, after.total_claim_distance
                ),
            });
        }
    }

    if let Some(min_gain) = gates.min_total_progress_ratio_gain {
        checked.push(PromotionRule::MinTotalProgressRatioGain);
        if delta.total_progress_ratio_gain < min_gain {
            violations.push(PromotionViolation {
                rule: PromotionRule::MinTotalProgressRatioGain,
                reason: format!(
                    "total progress ratio gain {:.4} is below minimum {min_gain}",
                    delta.total_progress_ratio_gain
                ),
            });
        }
    }

    PromotionVerdict {
        passed: violations.is_empty(),
        checked,
        violations,
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionPreview {
    pub status: StepStatus,
    pub disclaimer: String,
    pub registry_path: String,
    pub promotable: bool,
    /// sha256 of the registry as it is now; execute must echo it back.
    pub required_confirmation_hash: Option<String>,
    pub campaign_digest: Option<String>,
    pub stage_status: StageStatus,
    pub steps: Vec<StepReport>,
    pub current: Option<DistanceSnapshot>,
    pub projected_after: Option<DistanceSnapshot>,
    pub delta: Option<DistanceDelta>,
    pub gate_verdict: Option<PromotionVerdict>,
    pub source_sha256_before: Option<String>,
    pub source_sha256_after: Option<String>,
    pub source_untouched: bool,
    pub reasons: Vec<String>,
}

/// Project `campaign` on a sandbox copy and decide whether it is promotable.
pub fn preview_promotion(
    registry_path: &Path,
    campaign: &CampaignConfig,
    eval: &EvalReport,
    policy: &ClaimPolicy,
) -> PromotionPreview {
    let mut preview = PromotionPreview {
        status: StepStatus::Error,
        disclaimer: SANDBOX_DISCLAIMER.to_string(),
        registry_path: registry_path.display().to_string(),
        promotable: false,
        required_confirmation_hash: None,
        campaign_digest: None,
        stage_status: StageStatus::Error,
        steps: Vec::new(),
        current: None,
        projected_after: None,
        delta: None,
        gate_verdict: None,
        source_sha256_before: None,
        source_sha256_after: None,
        source_untouched: true,
        reasons: Vec::new(),
    };

    let projection = match project_campaign(registry_path, campaign, eval, &policy.release_policy) {
        Ok(p) => p,
        Err(e) => {
            preview.reasons.push(e.to_string());
            return preview;
        }
    };

    let verdict = evaluate_promotion_gates(
        &policy.promotion_gates,
        projection.replay.stage_status,
        &projection.before,
        &projection.after,
    );
    preview.reasons = verdict.reasons();
    preview.reasons.extend(projection.replay.failures());
    if let Some(reason) = &projection.replay.reason {
        preview.reasons.push(reason.clone());
    }

    let untouched = projection.source.source_untouched;
    if !untouched {
        preview
            .reasons
            .push("source registry changed during the preview".to_string());
    }
    preview.status = if untouched { StepStatus::Ok } else { StepStatus::Error };
    preview.promotable = untouched && verdict.passed;
    preview.required_confirmation_hash = Some(projection.source.source_sha256_after.clone());
    preview.campaign_digest = Some(projection.campaign_digest);
    preview.stage_status = projection.replay.stage_status;
    preview.steps = projection.replay.steps;
    preview.current = Some(projection.before);
    preview.projected_after = Some(projection.after);
    preview.delta = Some(projection.delta);
    preview.gate_verdict = Some(verdict);
    preview.source_sha256_before = Some(projection.source.source_sha256_before);
    preview.source_sha256_after = Some(projection.source.source_sha256_after);
    preview.source_untouched = untouched;

    if let Some(hash) = &preview.required_confirmation_hash {
        obs::emit_promotion_previewed(preview.promotable, hash);
    }
    preview
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// Restores the captured registry bytes unless disarmed. Covers early
/// returns and unwinding panics between capture and commit.
struct RollbackGuard<'a> {
    path: &'a Path,
    original: &'a [u8],
    armed: bool,
}

impl<'a> RollbackGuard<'a> {
    fn new(path: &'a Path, original: &'a [u8]) -> Self {
        Self {
            path,
            original,
            armed: true,
        }
    }

    fn commit(mut self) {
        self.armed = false;
    }

    /// Restore the original bytes and report whether the file hash matches again.
    fn rollback(mut self) -> crate::domain::Result<bool> {
        self.armed = false;
        write_atomic(self.path, self.original)?;
        Ok(sha256_hex(&fs::read(self.path)?) == sha256_hex(self.original))
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = write_atomic(self.path, self.original) {
                tracing::error!(path = %self.path.display(), error = %e, "registry restore failed");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionExecution {
    pub status: StepStatus,
    pub disclaimer: String,
    pub execution_id: String,
    pub registry_path: String,
    pub committed: bool,
    pub rolled_back: bool,
    pub rollback_verified: Option<bool>,
    pub confirmation_hash: String,
    pub registry_sha256_before: Option<String>,
    pub registry_sha256_after: Option<String>,
    pub campaign_digest: Option<String>,
    pub stage_status: Option<StageStatus>,
    pub steps: Vec<StepReport>,
    pub before: Option<DistanceSnapshot>,
    pub after: Option<DistanceSnapshot>,
    pub delta: Option<DistanceDelta>,
    pub gate_verdict: Option<PromotionVerdict>,
    pub reasons: Vec<String>,
}

impl PromotionExecution {
    fn rejected(mut self, reason: impl Into<String>) -> Self {
        self.status = StepStatus::Error;
        self.reasons.push(reason.into());
        self
    }
}

/// Replay `campaign` against the authoritative registry.
///
/// `confirmation_hash` must equal the registry's current sha256 (as handed
/// out by [`preview_promotion`]). Unless every promotion gate passes, the
/// registry's prior bytes are restored verbatim.
pub fn execute_promotion(
    registry_path: &Path,
    campaign: &CampaignConfig,
    eval: &EvalReport,
    policy: &ClaimPolicy,
    confirmation_hash: &str,
) -> PromotionExecution {
    let execution_id = Uuid::new_v4().to_string();
    let _span = PromotionSpan::enter(&execution_id);
    let supplied = confirmation_hash.trim();
    let report = PromotionExecution {
        status: StepStatus::Error,
        disclaimer: EXECUTE_DISCLAIMER.to_string(),
        execution_id: execution_id.clone(),
        registry_path: registry_path.display().to_string(),
        committed: false,
        rolled_back: false,
        rollback_verified: None,
        confirmation_hash: supplied.to_string(),
        registry_sha256_before: None,
        registry_sha256_after: None,
        campaign_digest: None,
        stage_status: None,
        steps: Vec::new(),
        before: None,
        after: None,
        delta: None,
        gate_verdict: None,
        reasons: Vec::new(),
    };

    if !registry_path.is_file() {
        return report.rejected(format!(
            "registry file does not exist: {}",
            registry_path.display()
        ));
    }
    let original = match fs::read(registry_path) {
        Ok(bytes) => bytes,
        Err(e) => return report.rejected(format!("cannot read registry: {e}")),
    };
    let current_hash = sha256_hex(&original);
    let mut report = PromotionExecution {
        registry_sha256_before: Some(current_hash.clone()),
        ..report
    };

    if supplied.is_empty() {
        return report.rejected("confirmation_hash is required; run a preview first");
    }
    if supplied != current_hash {
        obs::emit_confirmation_rejected(&current_hash, supplied);
        return report.rejected(
            "confirmation_hash does not match the current registry; it changed since preview",
        );
    }
    match campaign.digest() {
        Ok(d) => report.campaign_digest = Some(d),
        Err(e) => return report.rejected(format!("cannot digest campaign: {e}")),
    }

    let (_, status_before) = release_status_for(eval, registry_path, &policy.release_policy);
    let before = status_before.distance();

    let guard = RollbackGuard::new(registry_path, &original);
    let replay = replay_campaign(registry_path, campaign, eval);
    let (_, status_after) = release_status_for(eval, registry_path, &policy.release_policy);
    let after = status_after.distance();
    let verdict = evaluate_promotion_gates(&policy.promotion_gates, replay.stage_status, &before, &after);

    report.reasons = verdict.reasons();
    report.reasons.extend(replay.failures());
    if let Some(reason) = &replay.reason {
        report.reasons.push(reason.clone());
    }
    report.stage_status = Some(replay.stage_status);
    report.steps = replay.steps;
    report.delta = Some(DistanceDelta::between(&before, &after));
    report.before = Some(before);
    report.after = Some(after);

    if verdict.passed {
        guard.commit();
        report.gate_verdict = Some(verdict);
        report.committed = true;
        report.status = StepStatus::Ok;
        report.registry_sha256_after = fs::read(registry_path).ok().map(|b| sha256_hex(&b));
        METRICS.inc_promotions_executed();
        obs::emit_promotion_executed(&execution_id, true);
        return report;
    }

    report.gate_verdict = Some(verdict);
    report.rolled_back = true;
    match guard.rollback() {
        Ok(verified) => report.rollback_verified = Some(verified),
        Err(e) => {
            report.rollback_verified = Some(false);
            report.reasons.push(format!("rollback failed: {e}"));
        }
    }
    report.registry_sha256_after = fs::read(registry_path).ok().map(|b| sha256_hex(&b));
    METRICS.inc_rollbacks();
    obs::emit_promotion_rolled_back(&execution_id, &report.reasons.join("; "));
    obs::emit_promotion_executed(&execution_id, false);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::DistanceCeiling;

    fn snapshot(external: u32, total: u32, ready: bool) -> DistanceSnapshot {
        DistanceSnapshot {
            external_claim_distance: external,
            calibration_distance: total - external,
            total_claim_distance: total,
            max_external_claim_distance: 2,
            max_total_distance: 4,
            external_progress_ratio: crate::domain::release::progress_ratio(external, 2),
            total_progress_ratio: crate::domain::release::progress_ratio(total, 4),
            comparable_external_baselines: 2 - external,
            required_external_baselines: 2,
            external_claim_ready: ready,
        }
    }

    #[test]
    fn default_gates_need_one_step_of_progress() {
        let gates = PromotionGates::default();
        let v = evaluate_promotion_gates(&gates, StageStatus::Ok, &snapshot(2, 2, false), &snapshot(1, 1, false));
        assert!(v.passed);

        let v = evaluate_promotion_gates(&gates, StageStatus::Ok, &snapshot(1, 1, false), &snapshot(1, 1, false));
        assert!(!v.passed);
        assert_eq!(v.violations[0].rule, PromotionRule::MinDistanceReduction);
    }

    #[test]
    fn every_failing_check_is_reported() {
        let gates = PromotionGates {
            min_distance_reduction: 1,
            max_after_external_claim_distance: DistanceCeiling::Zero,
            require_external_claim_ready: true,
            require_total_distance_non_increase: true,
            min_total_progress_ratio_gain: Some(0.5),
        };
        let v = evaluate_promotion_gates(&gates, StageStatus::Partial, &snapshot(1, 1, false), &snapshot(1, 2, false));
        let rules: Vec<PromotionRule> = v.violations.iter().map(|x| x.rule).collect();
        assert_eq!(
            rules,
            vec![
                PromotionRule::StageStatusOk,
                PromotionRule::MinDistanceReduction,
                PromotionRule::MaxAfterExternalClaimDistance,
                PromotionRule::ExternalClaimReady,
                PromotionRule::TotalDistanceNonIncrease,
                PromotionRule::MinTotalProgressRatioGain,
            ]
        );
        assert!(v.reasons()[0].contains("partial"));
    }

    #[test]
    fn unset_ceiling_is_not_checked_but_zero_is() {
        let mut gates = PromotionGates::default();
        let v = evaluate_promotion_gates(&gates, StageStatus::Ok, &snapshot(2, 2, false), &snapshot(1, 1, false));
        assert!(!v.checked.contains(&PromotionRule::MaxAfterExternalClaimDistance));

        gates.max_after_external_claim_distance = DistanceCeiling::Zero;
        let v = evaluate_promotion_gates(&gates, StageStatus::Ok, &snapshot(2, 2, false), &snapshot(1, 1, false));
        assert!(!v.passed);

        gates.max_after_external_claim_distance = DistanceCeiling::AtMost(1);
        let v = evaluate_promotion_gates(&gates, StageStatus::Ok, &snapshot(2, 2, false), &snapshot(1, 1, false));
        assert!(v.passed);
    }

    #[test]
    fn rollback_guard_restores_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, b"original").unwrap();
        let original = fs::read(&path).unwrap();
        {
            let _guard = RollbackGuard::new(&path, &original);
            fs::write(&path, b"half-written").unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }
}
