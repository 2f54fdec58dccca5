mod common;

use claimgate_core::{
    attest_file, ingest_payload_file, normalize_file, AttestOptions, BaselinePatch,
    NormalizeOptions, Registry, ReplicationStatus, StepStatus,
};
use common::*;
use serde_json::json;

#[test]
fn failed_attestation_revokes_verification_but_keeps_last_stamp() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.88)]);

    let passed = attest_file(&registry, "ext-a", &eval(0.90), &AttestOptions::default());
    assert!(passed.passed);
    let stamp = Registry::load(&registry)
        .unwrap()
        .get("ext-a")
        .unwrap()
        .evidence
        .attestation
        .clone()
        .unwrap();
    assert_eq!(stamp.metrics_checked, vec!["quality".to_string()]);

    let failed = attest_file(&registry, "ext-a", &eval(0.50), &AttestOptions::default());
    assert_eq!(failed.status, StepStatus::Ok);
    assert!(!failed.passed);
    assert!(!failed.metric_checks["quality"].within_tolerance);

    let stored = Registry::load(&registry).unwrap();
    let record = stored.get("ext-a").unwrap();
    assert!(!record.verified);
    assert_eq!(record.evidence.replication_status, ReplicationStatus::ReplicationFailed);
    assert_eq!(record.evidence.attestation.as_ref(), Some(&stamp));
}

#[test]
fn dry_run_attestation_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), vec![clean_external("ext-a", 0.88)]);
    let before = std::fs::read(&registry).unwrap();
    let opts = AttestOptions {
        dry_run: true,
        ..AttestOptions::default()
    };
    let report = attest_file(&registry, "ext-a", &eval(0.90), &opts);
    assert!(report.passed);
    assert_eq!(std::fs::read(&registry).unwrap(), before);
}

#[test]
fn ingestion_downgrades_unreplicated_verified_claim() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.json");
    let mut payload = serde_json::to_value(clean_external("ext-new", 0.7)).unwrap();
    payload["verified"] = json!(true);
    payload["evidence"]["artifact_hash"] = json!(null);
    let payload_path = write_json(&dir.path().join("payload.json"), payload);

    let report = ingest_payload_file(&registry, &payload_path, false);
    assert_eq!(report.status, StepStatus::Ok, "{:?}", report.reason);
    assert!(report.verification_downgraded);
    assert!(report.artifact_hash_computed);

    let stored = Registry::load(&registry).unwrap();
    let record = stored.get("ext-new").unwrap();
    assert!(!record.verified);
    assert_eq!(record.evidence.artifact_hash, report.artifact_hash);
}

#[test]
fn ingestion_rejects_payload_without_citation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.json");
    let mut payload = serde_json::to_value(clean_external("ext-new", 0.7)).unwrap();
    payload["evidence"]["citation"] = json!("  ");
    let payload_path = write_json(&dir.path().join("payload.json"), payload);

    let report = ingest_payload_file(&registry, &payload_path, false);
    assert_eq!(report.status, StepStatus::Error);
    assert!(report.reason.unwrap().contains("citation"));
    assert!(!registry.exists());
}

#[test]
fn patches_cannot_touch_verification_state() {
    let err = serde_json::from_value::<BaselinePatch>(json!({"verified": true}));
    assert!(err.is_err());
    let err = serde_json::from_value::<BaselinePatch>(json!({"evidence": {"replication_status": "replicated-internal-harness"}}));
    assert!(err.is_err());
}

#[test]
fn normalization_aligns_and_reports_changed_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut record = clean_external("ext-a", 0.88);
    record.suite_id = Some("suite-v0".to_string());
    record.source_date = Some("03/01/2025".to_string());
    let registry = write_registry(dir.path(), vec![record]);
    let patch = write_json(
        &dir.path().join("p.json"),
        json!({"source_date": "2025-03-01", "notes": null}),
    );
    let eval = eval(0.9);
    let opts = NormalizeOptions {
        align_to: Some(&eval),
        ..NormalizeOptions::default()
    };

    let report = normalize_file(&registry, "ext-a", Some(&patch), &opts);
    assert_eq!(report.status, StepStatus::Ok, "{:?}", report.reason);
    assert_eq!(report.changed_fields, vec!["source_date", "suite_id"]);
    let stored = Registry::load(&registry).unwrap();
    assert_eq!(stored.get("ext-a").unwrap().suite_id.as_deref(), Some(SUITE));
}
