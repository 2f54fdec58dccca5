//! Baseline ingestion gate.
//!
//! Accepts a standalone baseline payload and inserts or updates it in the
//! registry. Payloads lacking an id or the evidence a reviewer needs to
//! trace the claim are rejected without touching the registry. External
//! payloads that claim `verified` without internal replication are accepted
//! but downgraded to unverified.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::baseline::BaselineRecord;
use crate::domain::digest::digest_of;
use crate::domain::registry::{Registry, UpsertOutcome};
use crate::domain::validation::{field_state, is_blank, is_iso_date, is_iso_date_or_timestamp, FieldState};
use crate::metrics::METRICS;
use crate::obs;
use crate::report::{read_json, StepStatus, INGESTION_DISCLAIMER};

/// Evidence fields a payload must carry to be accepted.
const REQUIRED_PAYLOAD_EVIDENCE: [&str; 3] = ["citation", "retrieval_date", "verification_method"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub origin: String,
    pub baseline_id: Option<String>,
    pub outcome: Option<UpsertOutcome>,
    pub artifact_hash: Option<String>,
    /// The payload had no artifact hash and one was derived from its content.
    pub artifact_hash_computed: bool,
    pub verification_downgraded: bool,
    pub dry_run: bool,
    pub warnings: Vec<String>,
    pub reason: Option<String>,
}

impl IngestionReport {
    fn new(origin: &str, dry_run: bool) -> Self {
        Self {
            status: StepStatus::Ok,
            disclaimer: INGESTION_DISCLAIMER.to_string(),
            origin: origin.to_string(),
            baseline_id: None,
            outcome: None,
            artifact_hash: None,
            artifact_hash_computed: false,
            verification_downgraded: false,
            dry_run,
            warnings: Vec::new(),
            reason: None,
        }
    }

    fn rejected(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        obs::emit_ingestion_rejected(&self.origin, &reason);
        self.status = StepStatus::Error;
        self.outcome = None;
        self.reason = Some(reason);
        self
    }
}

/// Reasons a payload cannot be accepted at all. Empty means acceptable.
pub fn rejection_reasons(record: &BaselineRecord) -> Vec<String> {
    let mut reasons = Vec::new();
    if is_blank(&record.baseline_id) {
        reasons.push("baseline_id is empty".to_string());
    }
    let empty: Vec<&str> = REQUIRED_PAYLOAD_EVIDENCE
        .into_iter()
        .filter(|f| field_state(record.evidence.field(f)) == FieldState::Missing)
        .collect();
    if !empty.is_empty() {
        reasons.push(format!("required evidence fields are empty: {}", empty.join(", ")));
    }
    if let Some(date) = record.source_date.as_deref().filter(|d| !is_blank(d)) {
        if field_state(Some(date)) == FieldState::Present && !is_iso_date(date) {
            reasons.push(format!("source_date is not an ISO-8601 date: '{date}'"));
        }
    }
    if let Some(date) = record.evidence.retrieval_date.as_deref() {
        if field_state(Some(date)) == FieldState::Present && !is_iso_date_or_timestamp(date) {
            reasons.push(format!("evidence.retrieval_date is not an ISO-8601 date: '{date}'"));
        }
    }
    reasons
}

/// Ingest `record` into an in-memory registry.
///
/// The registry is left untouched when the payload is rejected.
pub fn ingest_record(registry: &mut Registry, mut record: BaselineRecord, origin: &str) -> IngestionReport {
    let mut report = IngestionReport::new(origin, false);
    if !is_blank(&record.baseline_id) {
        report.baseline_id = Some(record.baseline_id.clone());
    }

    let reasons = rejection_reasons(&record);
    if !reasons.is_empty() {
        return report.rejected(reasons.join("; "));
    }
    record.baseline_id = record.baseline_id.trim().to_string();

    for field in ["citation", "verification_method"] {
        if field_state(record.evidence.field(field)) == FieldState::Placeholder {
            report
                .warnings
                .push(format!("evidence.{field} holds a placeholder value"));
        }
    }

    if record.is_over_claimed() {
        record.verified = false;
        report.verification_downgraded = true;
        report.warnings.push(
            "external baseline claimed verified without internal replication; stored as unverified"
                .to_string(),
        );
        obs::emit_verification_downgraded(&record.baseline_id);
    }

    if field_state(record.evidence.artifact_hash.as_deref()) == FieldState::Missing {
        record.evidence.artifact_hash = None;
        let mut hashed = record.clone();
        hashed.evidence.attestation = None;
        match digest_of(&hashed) {
            Ok(hash) => {
                record.evidence.artifact_hash = Some(hash);
                report.artifact_hash_computed = true;
            }
            Err(e) => return report.rejected(format!("cannot hash payload: {e}")),
        }
    }
    report.artifact_hash = record.evidence.artifact_hash.clone();

    let baseline_id = record.baseline_id.clone();
    let outcome = registry.upsert(record);
    report.outcome = Some(outcome);
    METRICS.inc_ingestions();
    obs::emit_baseline_ingested(
        &baseline_id,
        match outcome {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated => "updated",
        },
        report.verification_downgraded,
    );
    report
}

/// Ingest the payload file at `payload_path` into the registry file.
///
/// A missing registry file is created. With `dry_run` the outcome is
/// computed but nothing is written.
pub fn ingest_payload_file(registry_path: &Path, payload_path: &Path, dry_run: bool) -> IngestionReport {
    let origin = payload_path.display().to_string();
    let record: BaselineRecord = match read_json(payload_path) {
        Ok(r) => r,
        Err(e) => return IngestionReport::new(&origin, dry_run).rejected(e.to_string()),
    };
    let mut registry = match Registry::load(registry_path) {
        Ok(r) => r,
        Err(e) => return IngestionReport::new(&origin, dry_run).rejected(e.to_string()),
    };

    let mut report = ingest_record(&mut registry, record, &origin);
    report.dry_run = dry_run;
    if !report.status.is_ok() || dry_run {
        return report;
    }
    if let Err(e) = registry.save(registry_path) {
        return report.rejected(format!("cannot write registry: {e}"));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::baseline::{ReplicationStatus, SourceType};

    fn payload(id: &str) -> BaselineRecord {
        let mut record = BaselineRecord::new(id, SourceType::ExternalReported);
        record.source_date = Some("2025-01-10".to_string());
        record.evidence.citation = Some("arxiv:2501.00001".to_string());
        record.evidence.retrieval_date = Some("2025-02-01".to_string());
        record.evidence.verification_method = Some("paper table 3".to_string());
        record.metrics.insert("quality".to_string(), 0.8);
        record
    }

    #[test]
    fn inserts_then_updates() {
        let mut registry = Registry::empty();
        let first = ingest_record(&mut registry, payload("ext-a"), "inline");
        assert_eq!(first.status, StepStatus::Ok);
        assert_eq!(first.outcome, Some(UpsertOutcome::Inserted));

        let second = ingest_record(&mut registry, payload("ext-a"), "inline");
        assert_eq!(second.outcome, Some(UpsertOutcome::Updated));
        assert_eq!(registry.baselines.len(), 1);
    }

    #[test]
    fn rejects_missing_evidence_without_mutation() {
        let mut registry = Registry::empty();
        let mut record = payload("ext-a");
        record.evidence.citation = Some("  ".to_string());
        record.evidence.verification_method = None;
        let report = ingest_record(&mut registry, record, "inline");
        assert_eq!(report.status, StepStatus::Error);
        let reason = report.reason.unwrap();
        assert!(reason.contains("citation"));
        assert!(reason.contains("verification_method"));
        assert!(registry.baselines.is_empty());
    }

    #[test]
    fn rejects_blank_id() {
        let mut registry = Registry::empty();
        let report = ingest_record(&mut registry, payload(" "), "inline");
        assert_eq!(report.status, StepStatus::Error);
        assert!(report.reason.unwrap().contains("baseline_id"));
    }

    #[test]
    fn over_claimed_external_is_downgraded() {
        let mut registry = Registry::empty();
        let mut record = payload("ext-a");
        record.verified = true;
        let report = ingest_record(&mut registry, record, "inline");
        assert!(report.verification_downgraded);
        assert_eq!(report.warnings.len(), 1);
        let stored = registry.get("ext-a").unwrap();
        assert!(!stored.verified);
        assert_eq!(stored.evidence.replication_status, ReplicationStatus::Pending);
    }

    #[test]
    fn artifact_hash_is_derived_when_absent() {
        let mut registry = Registry::empty();
        let report = ingest_record(&mut registry, payload("ext-a"), "inline");
        assert!(report.artifact_hash_computed);
        let hash = registry.get("ext-a").unwrap().evidence.artifact_hash.clone().unwrap();
        assert_eq!(hash.len(), 64);

        let mut other = Registry::empty();
        let again = ingest_record(&mut other, payload("ext-a"), "inline");
        assert_eq!(again.artifact_hash, Some(hash));
    }

    #[test]
    fn declared_artifact_hash_is_kept() {
        let mut registry = Registry::empty();
        let mut record = payload("ext-a");
        record.evidence.artifact_hash = Some("sha256:abc".to_string());
        let report = ingest_record(&mut registry, record, "inline");
        assert!(!report.artifact_hash_computed);
        assert_eq!(report.artifact_hash.as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn dry_run_leaves_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("registry.json");
        let payload_path = dir.path().join("payload.json");
        std::fs::write(&payload_path, serde_json::to_vec(&payload("ext-a")).unwrap()).unwrap();

        let report = ingest_payload_file(&registry_path, &payload_path, true);
        assert_eq!(report.status, StepStatus::Ok);
        assert!(report.dry_run);
        assert!(!registry_path.exists());

        let report = ingest_payload_file(&registry_path, &payload_path, false);
        assert_eq!(report.status, StepStatus::Ok);
        let registry = Registry::load_existing(&registry_path).unwrap();
        assert!(registry.get("ext-a").is_some());
    }

    #[test]
    fn malformed_payload_is_an_error_report() {
        let dir = tempfile::tempdir().unwrap();
        let payload_path = dir.path().join("payload.json");
        std::fs::write(&payload_path, b"[1, 2").unwrap();
        let report = ingest_payload_file(&dir.path().join("r.json"), &payload_path, false);
        assert_eq!(report.status, StepStatus::Error);
        assert!(report.reason.unwrap().contains("payload.json"));
    }
}
