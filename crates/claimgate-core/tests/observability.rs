//! Lifecycle events emitted by the record gates and the promotion path.

mod common;

use claimgate_core::metrics::METRICS;
use claimgate_core::obs::{emit_promotion_rolled_back, emit_sandbox_completed, PromotionSpan};
use claimgate_core::{
    attest_file, execute_promotion, AttestOptions, BaselineRun, CampaignConfig, ClaimPolicy,
};
use common::*;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn attestation_emits_recorded_event() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.89)]);
    let before = METRICS.attestations();
    attest_file(&registry, "ext-a", &eval(0.90), &AttestOptions::default());
    assert!(logs_contain("attestation.recorded"));
    assert!(METRICS.attestations() > before);
}

#[traced_test]
#[test]
fn rejected_confirmation_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.89)]);
    let campaign = CampaignConfig {
        ingest_payload_paths: vec![],
        baseline_runs: vec![BaselineRun::new("ext-a")],
    };
    execute_promotion(&registry, &campaign, &eval(0.90), &ClaimPolicy::default(), "deadbeef");
    assert!(logs_contain("promotion.confirmation_rejected"));
    assert!(logs_contain("deadbeef"));
}

#[traced_test]
#[test]
fn rollback_counts_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.50)]);
    let campaign = CampaignConfig {
        ingest_payload_paths: vec![],
        baseline_runs: vec![BaselineRun::new("ext-a")],
    };
    let before = METRICS.rollbacks();
    let report = execute_promotion(
        &registry,
        &campaign,
        &eval(0.90),
        &ClaimPolicy::default(),
        &file_hash(&registry),
    );
    assert!(report.rolled_back);
    assert!(METRICS.rollbacks() > before);
    assert!(logs_contain("promotion.rolled_back"));
    assert!(logs_contain(&report.execution_id));
}

#[traced_test]
#[test]
fn span_and_sandbox_events_do_not_panic() {
    let _span = PromotionSpan::enter("exec-test");
    emit_sandbox_completed("partial", false);
    emit_promotion_rolled_back("exec-test", &"gate failed");
    assert!(logs_contain("sandbox.source_modified"));
}
