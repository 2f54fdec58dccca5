mod common;

use claimgate_core::domain::release::release_status_for;
use claimgate_core::planner::ActionType;
use claimgate_core::{
    attest_file, compare_path, plan, AttestOptions, ClaimPolicy, ComparisonStatus,
    ReleasePolicy, ReplicationStatus, SourceType, BaselineRecord, StepStatus,
};
use common::*;

#[test]
fn unverified_baseline_needs_only_attestation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.88)]);
    let eval = eval(0.90);

    let comparison = compare_path(&eval, &registry);
    assert_eq!(comparison.status, ComparisonStatus::Ok);
    let row = comparison.row("ext-a").unwrap();
    assert!(!row.is_comparable());
    assert_eq!(
        serde_json::to_value(&row.comparability.reasons).unwrap(),
        serde_json::json!(["baseline unverified"])
    );
    assert!(row.verification.evidence_valid);

    let (comparison, status) =
        release_status_for(&eval, &registry, &ClaimPolicy::default().release_policy);
    assert_eq!(status.distance().external_claim_distance, 1);
    let claim_plan = plan(&eval, &status, &comparison);
    assert_eq!(claim_plan.status, StepStatus::Ok);
    let row_plan = claim_plan.row("ext-a").unwrap();
    let actions: Vec<ActionType> = row_plan.actions.iter().map(|a| a.action_type).collect();
    assert_eq!(actions, vec![ActionType::AttestBaseline]);
    assert_eq!(claim_plan.recoverable_external_rows, 1);
    assert_eq!(claim_plan.additional_baselines_needed, 0);
}

#[test]
fn broken_row_plans_fixed_action_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut record = clean_external("ext-b", 0.88);
    record.evidence.citation = Some("TBD".to_string());
    record.source_date = Some("March 2025".to_string());
    record.suite_id = Some("suite-v0".to_string());
    record.metrics.clear();
    let registry = write_registry(dir.path(), vec![record]);
    let eval = eval(0.90);

    let (comparison, status) =
        release_status_for(&eval, &registry, &ClaimPolicy::default().release_policy);
    let claim_plan = plan(&eval, &status, &comparison);
    let actions: Vec<ActionType> = claim_plan.row("ext-b").unwrap().actions.iter().map(|a| a.action_type).collect();
    assert_eq!(
        actions,
        vec![
            ActionType::RefreshEvidencePayload,
            ActionType::ReplacePlaceholderMetadata,
            ActionType::NormalizeMetadataDates,
            ActionType::NormalizeHarnessAlignment,
            ActionType::AddOverlappingMetrics,
            ActionType::AttestBaseline,
        ]
    );
    let priorities: Vec<u32> = claim_plan.row("ext-b").unwrap().actions.iter().map(|a| a.priority).collect();
    assert_eq!(priorities, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn distance_never_goes_negative() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = clean_external("ext-a", 0.88);
    let mut b = clean_external("ext-b", 0.91);
    for r in [&mut a, &mut b] {
        r.verified = true;
        r.evidence.replication_status = ReplicationStatus::ReplicatedInternalHarness;
    }
    let registry = write_registry(dir.path(), vec![a, b]);

    let (comparison, status) = release_status_for(&eval(0.90), &registry, &ReleasePolicy::default());
    assert_eq!(comparison.summary.comparable_external_baselines, 2);
    let snapshot = status.distance();
    assert_eq!(snapshot.external_claim_distance, 0);
    assert_eq!(snapshot.total_claim_distance, 0);
    assert_eq!(snapshot.external_progress_ratio, 1.0);
    assert!(status.external_claim_ready);
}

#[test]
fn missing_registry_means_no_baselines() {
    let dir = tempfile::tempdir().unwrap();
    let report = compare_path(&eval(0.9), &dir.path().join("absent.json"));
    assert_eq!(report.status, ComparisonStatus::NoBaselinesConfigured);
    assert!(report.rows.is_empty());
}

#[test]
fn internal_baseline_cannot_be_attested() {
    let dir = tempfile::tempdir().unwrap();
    let mut internal = BaselineRecord::new("int-a", SourceType::InternalReference);
    internal.metrics.insert("quality".to_string(), 0.9);
    let registry = write_registry(dir.path(), vec![internal]);
    let before = std::fs::read(&registry).unwrap();

    let report = attest_file(&registry, "int-a", &eval(0.9), &AttestOptions::default());
    assert_eq!(report.status, StepStatus::Error);
    assert!(report
        .reason
        .unwrap()
        .contains("attestation only allowed for external baselines"));
    assert_eq!(std::fs::read(&registry).unwrap(), before);
}
