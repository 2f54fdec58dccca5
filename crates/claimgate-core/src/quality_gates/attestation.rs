//! Attestation gate.
//!
//! Checks an external baseline's declared metrics against the metrics our
//! harness observed. A baseline passes when it shares at least one metric
//! with the report and every shared metric agrees within `max_metric_delta`.
//! The outcome is always recorded: a pass marks the baseline verified and
//! replicated, a failure marks it unverified with `replication-failed`.
//! The stamped [`AttestationRecord`] describes the last passing attestation.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::comparability::TIE_EPSILON;
use crate::domain::baseline::{AttestationRecord, BaselineRecord, ReplicationStatus};
use crate::domain::error::{ClaimError, Result};
use crate::domain::eval::EvalReport;
use crate::domain::registry::Registry;
use crate::metrics::METRICS;
use crate::obs;
use crate::report::{StepStatus, ATTESTATION_DISCLAIMER};

pub const DEFAULT_MAX_METRIC_DELTA: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttestOptions {
    pub max_metric_delta: f64,
    pub dry_run: bool,
}

impl Default for AttestOptions {
    fn default() -> Self {
        Self {
            max_metric_delta: DEFAULT_MAX_METRIC_DELTA,
            dry_run: false,
        }
    }
}

/// Agreement of one shared metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCheck {
    pub declared: f64,
    pub observed: f64,
    pub delta: f64,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub baseline_id: String,
    pub passed: bool,
    pub verified: bool,
    pub replication_status: ReplicationStatus,
    pub max_metric_delta: f64,
    pub metric_checks: BTreeMap<String, MetricCheck>,
    pub reasons: Vec<String>,
    pub dry_run: bool,
    pub reason: Option<String>,
}

impl AttestationReport {
    fn new(baseline_id: &str, opts: &AttestOptions) -> Self {
        Self {
            status: StepStatus::Ok,
            disclaimer: ATTESTATION_DISCLAIMER.to_string(),
            baseline_id: baseline_id.to_string(),
            passed: false,
            verified: false,
            replication_status: ReplicationStatus::Pending,
            max_metric_delta: opts.max_metric_delta,
            metric_checks: BTreeMap::new(),
            reasons: Vec::new(),
            dry_run: opts.dry_run,
            reason: None,
        }
    }

    fn failed(mut self, reason: impl std::fmt::Display) -> Self {
        self.status = StepStatus::Error;
        self.passed = false;
        self.reason = Some(reason.to_string());
        self
    }
}

/// Result of attesting one record.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationOutcome {
    pub passed: bool,
    pub metric_checks: BTreeMap<String, MetricCheck>,
    pub reasons: Vec<String>,
}

/// Attest `record` against `eval`, mutating its verification state.
///
/// Errors (and leaves the record alone) for non-external baselines and for
/// a negative or non-finite tolerance.
pub fn attest_record(
    record: &mut BaselineRecord,
    eval: &EvalReport,
    max_metric_delta: f64,
    now: DateTime<Utc>,
) -> Result<AttestationOutcome> {
    if !record.is_external() {
        return Err(ClaimError::input(
            &record.baseline_id,
            format!(
                "attestation only allowed for external baselines (source_type={})",
                record.source_type
            ),
        ));
    }
    if !max_metric_delta.is_finite() || max_metric_delta < 0.0 {
        return Err(ClaimError::input(
            &record.baseline_id,
            format!("max_metric_delta must be a non-negative number, got {max_metric_delta}"),
        ));
    }

    let mut checks = BTreeMap::new();
    let mut reasons = Vec::new();
    for (name, declared) in &record.metrics {
        let Some(observed) = eval.observed().get(name) else {
            continue;
        };
        let delta = (declared - observed).abs();
        let within = delta <= max_metric_delta + TIE_EPSILON;
        if !within {
            reasons.push(format!(
                "{name} differs by {delta:.4} (declared {declared}, observed {observed}, tolerance {max_metric_delta})"
            ));
        }
        checks.insert(
            name.clone(),
            MetricCheck {
                declared: *declared,
                observed: *observed,
                delta,
                within_tolerance: within,
            },
        );
    }
    if checks.is_empty() {
        reasons.push("no overlapping metrics between baseline and eval report".to_string());
    }
    let passed = reasons.is_empty();

    if passed {
        record.verified = true;
        record.evidence.replication_status = ReplicationStatus::ReplicatedInternalHarness;
        record.evidence.attestation = Some(AttestationRecord {
            attested_at: now,
            suite_id: eval.suite_id().to_string(),
            scoring_protocol: eval.scoring_reference().to_string(),
            max_metric_delta,
            metrics_checked: checks.keys().cloned().collect(),
            reasons: vec![format!(
                "{} metric(s) within tolerance {max_metric_delta}",
                checks.len()
            )],
        });
    } else {
        record.verified = false;
        record.evidence.replication_status = ReplicationStatus::ReplicationFailed;
    }

    Ok(AttestationOutcome {
        passed,
        metric_checks: checks,
        reasons,
    })
}

/// Attest one baseline of an in-memory registry.
pub fn attest_in_registry(
    registry: &mut Registry,
    baseline_id: &str,
    eval: &EvalReport,
    opts: &AttestOptions,
    now: DateTime<Utc>,
) -> AttestationReport {
    let report = AttestationReport::new(baseline_id, opts);
    let Some(record) = registry.get_mut(baseline_id) else {
        return report.failed(ClaimError::BaselineNotFound(baseline_id.to_string()));
    };
    match attest_record(record, eval, opts.max_metric_delta, now) {
        Ok(outcome) => {
            METRICS.inc_attestations();
            obs::emit_attestation_recorded(baseline_id, outcome.passed, outcome.metric_checks.len());
            AttestationReport {
                passed: outcome.passed,
                verified: record.verified,
                replication_status: record.evidence.replication_status,
                metric_checks: outcome.metric_checks,
                reasons: outcome.reasons,
                ..report
            }
        }
        Err(e) => AttestationReport {
            verified: record.verified,
            replication_status: record.evidence.replication_status,
            ..report
        }
        .failed(e),
    }
}

/// Attest a baseline in the registry file, persisting pass or fail.
pub fn attest_file(
    registry_path: &Path,
    baseline_id: &str,
    eval: &EvalReport,
    opts: &AttestOptions,
) -> AttestationReport {
    let mut registry = match Registry::load(registry_path) {
        Ok(r) => r,
        Err(e) => return AttestationReport::new(baseline_id, opts).failed(e),
    };
    let report = attest_in_registry(&mut registry, baseline_id, eval, opts, Utc::now());
    if !report.status.is_ok() || opts.dry_run {
        return report;
    }
    match registry.save(registry_path) {
        Ok(()) => report,
        Err(e) => report.failed(format!("cannot write registry: {e}")),
    }
}
