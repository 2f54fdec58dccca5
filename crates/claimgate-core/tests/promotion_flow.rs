mod common;

use std::fs;

use claimgate_core::{
    execute_promotion, preview_promotion, run_campaign, BaselineRun, CampaignConfig, ClaimPolicy,
    PromotionRule, Registry, ReplicationStatus, StageStatus, StepStatus,
};
use common::*;
use serde_json::json;

/// Registry with one external baseline whose declared quality is off by 0.10.
fn setup() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.80)]);
    (dir, registry)
}

fn patched_campaign(dir: &std::path::Path, quality: f64) -> CampaignConfig {
    let patch = write_json(
        &dir.join("ext-a.patch.json"),
        json!({"baseline_id": "ext-a", "metrics": {"quality": quality}}),
    );
    let mut run = BaselineRun::new("ext-a");
    run.patch_overrides_path = Some(patch);
    CampaignConfig {
        ingest_payload_paths: vec![],
        baseline_runs: vec![run],
    }
}

fn attest_only_campaign() -> CampaignConfig {
    CampaignConfig {
        ingest_payload_paths: vec![],
        baseline_runs: vec![BaselineRun::new("ext-a")],
    }
}

#[test]
fn preview_projects_zero_distance_without_touching_source() {
    let (dir, registry) = setup();
    let before = fs::read(&registry).unwrap();
    let campaign = patched_campaign(dir.path(), 0.895);

    let preview = preview_promotion(&registry, &campaign, &eval(0.90), &ClaimPolicy::default());
    assert_eq!(preview.status, StepStatus::Ok);
    assert!(preview.promotable, "{:?}", preview.reasons);
    assert_eq!(preview.stage_status, StageStatus::Ok);
    assert_eq!(preview.current.as_ref().unwrap().external_claim_distance, 1);
    assert_eq!(preview.projected_after.as_ref().unwrap().external_claim_distance, 0);
    assert_eq!(preview.delta.as_ref().unwrap().external_claim_distance_reduction, 1);
    assert_eq!(
        preview.required_confirmation_hash.as_deref(),
        Some(file_hash(&registry).as_str())
    );
    assert!(preview.source_untouched);
    assert_eq!(fs::read(&registry).unwrap(), before);
}

#[test]
fn failed_attestation_is_not_promotable() {
    let (_dir, registry) = setup();
    let preview = preview_promotion(
        &registry,
        &attest_only_campaign(),
        &eval(0.90),
        &ClaimPolicy::default(),
    );
    assert!(!preview.promotable);
    assert_eq!(preview.stage_status, StageStatus::Error);
    let rules: Vec<PromotionRule> = preview
        .gate_verdict
        .unwrap()
        .violations
        .iter()
        .map(|v| v.rule)
        .collect();
    assert!(rules.contains(&PromotionRule::StageStatusOk));
    assert!(rules.contains(&PromotionRule::MinDistanceReduction));
}

#[test]
fn execute_commits_with_matching_hash() {
    let (dir, registry) = setup();
    let campaign = patched_campaign(dir.path(), 0.895);
    let policy = ClaimPolicy::default();
    let eval = eval(0.90);

    let preview = preview_promotion(&registry, &campaign, &eval, &policy);
    let hash = preview.required_confirmation_hash.unwrap();
    let report = execute_promotion(&registry, &campaign, &eval, &policy, &hash);

    assert_eq!(report.status, StepStatus::Ok, "{:?}", report.reasons);
    assert!(report.committed);
    assert!(!report.rolled_back);
    assert!(!report.execution_id.is_empty());
    assert_eq!(report.registry_sha256_before.as_deref(), Some(hash.as_str()));
    assert_ne!(report.registry_sha256_after.as_deref(), Some(hash.as_str()));
    assert_eq!(report.after.as_ref().unwrap().external_claim_distance, 0);

    let stored = Registry::load(&registry).unwrap();
    let record = stored.get("ext-a").unwrap();
    assert!(record.verified);
    assert_eq!(record.metrics["quality"], 0.895);
    assert_eq!(
        record.evidence.replication_status,
        ReplicationStatus::ReplicatedInternalHarness
    );
    assert!(record.evidence.attestation.is_some());
}

#[test]
fn stale_hash_is_rejected_without_mutation() {
    let (dir, registry) = setup();
    let campaign = patched_campaign(dir.path(), 0.895);
    let policy = ClaimPolicy::default();
    let eval = eval(0.90);
    let preview = preview_promotion(&registry, &campaign, &eval, &policy);
    let stale = preview.required_confirmation_hash.unwrap();

    let mut edited = Registry::load(&registry).unwrap();
    edited.get_mut("ext-a").unwrap().notes = Some("edited after preview".to_string());
    edited.save(&registry).unwrap();
    let edited_bytes = fs::read(&registry).unwrap();

    let report = execute_promotion(&registry, &campaign, &eval, &policy, &stale);
    assert_eq!(report.status, StepStatus::Error);
    assert!(!report.committed);
    assert!(!report.rolled_back);
    assert!(report.steps.is_empty());
    assert!(report.reasons[0].contains("does not match"));
    assert_eq!(fs::read(&registry).unwrap(), edited_bytes);
}

#[test]
fn blank_hash_and_missing_registry_are_refused() {
    let (dir, registry) = setup();
    let campaign = patched_campaign(dir.path(), 0.895);
    let policy = ClaimPolicy::default();
    let before = fs::read(&registry).unwrap();

    let report = execute_promotion(&registry, &campaign, &eval(0.90), &policy, "   ");
    assert_eq!(report.status, StepStatus::Error);
    assert!(report.reasons[0].contains("required"));
    assert_eq!(fs::read(&registry).unwrap(), before);

    let absent = dir.path().join("absent.json");
    let report = execute_promotion(&absent, &campaign, &eval(0.90), &policy, "abc");
    assert_eq!(report.status, StepStatus::Error);
    assert!(!absent.exists());
}

#[test]
fn failed_gates_restore_exact_bytes() {
    let (_dir, registry) = setup();
    let before = fs::read(&registry).unwrap();
    let hash = file_hash(&registry);

    let report = execute_promotion(
        &registry,
        &attest_only_campaign(),
        &eval(0.90),
        &ClaimPolicy::default(),
        &hash,
    );
    assert_eq!(report.status, StepStatus::Error);
    assert!(!report.committed);
    assert!(report.rolled_back);
    assert_eq!(report.rollback_verified, Some(true));
    assert_eq!(report.registry_sha256_after.as_deref(), Some(hash.as_str()));
    assert_eq!(fs::read(&registry).unwrap(), before);
}

#[test]
fn ceiling_from_policy_file_blocks_partial_progress() {
    let (dir, registry) = setup();
    let policy_path = write_json(
        &dir.path().join("policy.json"),
        json!({
            "release_policy": {"required_external_baselines": 2},
            "promotion_gates": {"max_after_external_claim_distance": 0}
        }),
    );
    let policy = ClaimPolicy::load(Some(&policy_path)).unwrap();
    let preview = preview_promotion(
        &registry,
        &patched_campaign(dir.path(), 0.895),
        &eval(0.90),
        &policy,
    );
    assert!(!preview.promotable);
    assert_eq!(preview.projected_after.as_ref().unwrap().external_claim_distance, 1);
    let verdict = preview.gate_verdict.unwrap();
    assert_eq!(verdict.violations.len(), 1);
    assert_eq!(verdict.violations[0].rule, PromotionRule::MaxAfterExternalClaimDistance);
}

#[test]
fn sandbox_campaign_leaves_source_alone() {
    let (dir, registry) = setup();
    let before = fs::read(&registry).unwrap();
    let report = run_campaign(
        &registry,
        &patched_campaign(dir.path(), 0.895),
        &eval(0.90),
        &ClaimPolicy::default().release_policy,
    );
    assert_eq!(report.status, StepStatus::Ok);
    assert!(report.source_untouched);
    assert_eq!(report.source_sha256_before, report.source_sha256_after);
    assert_eq!(report.after.unwrap().external_claim_distance, 0);
    assert_eq!(fs::read(&registry).unwrap(), before);
}

#[test]
fn duplicate_runs_are_refused_by_preview() {
    let (_dir, registry) = setup();
    let campaign = CampaignConfig {
        ingest_payload_paths: vec![],
        baseline_runs: vec![BaselineRun::new("ext-a"), BaselineRun::new("ext-a")],
    };
    let preview = preview_promotion(&registry, &campaign, &eval(0.90), &ClaimPolicy::default());
    assert!(!preview.promotable);
    assert!(preview.reasons.iter().any(|r| r.contains("more than once")));
}
