//! Validator stage.
//!
//! Re-checks every file a campaign references before anything is replayed:
//! ingest payloads must be acceptable and free of placeholder values, patch
//! files must parse, be fully resolved, carry no placeholders and apply
//! cleanly, and every staged or targeted baseline must end up sharing at
//! least one metric with the eval report. Checks run against an in-memory
//! copy of the registry that is never written back.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::cache::DocumentStore;
use super::{CampaignConfig, StagingLayout};
use crate::domain::baseline::BaselineRecord;
use crate::domain::error::Result;
use crate::domain::eval::EvalReport;
use crate::domain::patch::BaselinePatch;
use crate::domain::registry::Registry;
use crate::domain::validation::{field_state, is_placeholder, FieldState};
use crate::obs;
use crate::quality_gates::ingestion::rejection_reasons;
use crate::quality_gates::normalization::{apply_patch, NormalizeOptions};
use crate::report::{write_json_file, StepStatus, STAGING_DISCLAIMER};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// File or campaign element the issue is about.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub campaign_digest: String,
    pub checked_payloads: u32,
    pub checked_patches: u32,
    pub checked_runs: u32,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.status.is_ok()
    }
}

struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, target: impl Into<String>, baseline_id: Option<&str>, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            target: target.into(),
            baseline_id: baseline_id.map(str::to_string),
            message: message.into(),
        });
    }
}

/// Text fields of a payload that hold a placeholder token.
fn placeholder_fields(record: &BaselineRecord) -> Vec<String> {
    let top = [
        ("label", record.label.as_deref()),
        ("source", record.source.as_deref()),
        ("source_date", record.source_date.as_deref()),
        ("suite_id", record.suite_id.as_deref()),
        ("scoring_protocol", record.scoring_protocol.as_deref()),
    ];
    let evidence = crate::domain::baseline::Evidence::REQUIRED_FIELDS
        .map(|f| (f, record.evidence.field(f)));
    let mut out: Vec<String> = top
        .into_iter()
        .filter(|(_, v)| field_state(*v) == FieldState::Placeholder)
        .map(|(name, _)| name.to_string())
        .collect();
    out.extend(
        evidence
            .into_iter()
            .filter(|(_, v)| field_state(*v) == FieldState::Placeholder)
            .map(|(name, _)| format!("evidence.{name}")),
    );
    out
}

fn shares_metric(record: &BaselineRecord, eval: &EvalReport) -> bool {
    record.metrics.keys().any(|m| eval.observed().contains_key(m))
}

/// Validate `campaign` against `eval` and the registry at `registry_path`.
pub fn validate_campaign(
    campaign: &CampaignConfig,
    eval: &EvalReport,
    registry_path: &Path,
    store: &mut DocumentStore,
) -> ValidationReport {
    let mut issues = Issues(Vec::new());
    let campaign_digest = campaign.digest().unwrap_or_else(|e| {
        issues.push("campaign", None, format!("cannot digest campaign: {e}"));
        String::new()
    });

    for id in campaign.duplicate_baseline_ids() {
        issues.push(
            "campaign",
            Some(&id),
            "baseline is targeted by more than one baseline run",
        );
    }

    let mut registry = Registry::load(registry_path).unwrap_or_else(|e| {
        issues.push(registry_path.display().to_string(), None, e.to_string());
        Registry::empty()
    });

    let mut checked_payloads = 0;
    for path in &campaign.ingest_payload_paths {
        checked_payloads += 1;
        let target = path.display().to_string();
        let record: BaselineRecord = match store.load(path) {
            Ok(r) => r,
            Err(e) => {
                issues.push(target, None, e.to_string());
                continue;
            }
        };
        let mut reasons = rejection_reasons(&record);
        let placeholders = placeholder_fields(&record);
        if !placeholders.is_empty() {
            reasons.push(format!("placeholder values in: {}", placeholders.join(", ")));
        }
        // A baseline run may still patch metrics in; it is checked after patching.
        let targeted = campaign
            .baseline_runs
            .iter()
            .any(|r| r.baseline_id == record.baseline_id.trim());
        if !targeted && !shares_metric(&record, eval) {
            reasons.push("no metric overlap with the eval report".to_string());
        }
        if reasons.is_empty() {
            registry.upsert(record);
        } else {
            issues.push(target, Some(&record.baseline_id), reasons.join("; "));
        }
    }

    let mut checked_patches = 0;
    let mut seen = BTreeSet::new();
    for run in &campaign.baseline_runs {
        let id = run.baseline_id.as_str();
        if !seen.insert(id) {
            continue;
        }
        if !run.max_metric_delta.is_finite() || run.max_metric_delta < 0.0 {
            issues.push(
                "campaign",
                Some(id),
                format!("max_metric_delta must be a non-negative number, got {}", run.max_metric_delta),
            );
        }
        let Some(current) = registry.get(id) else {
            issues.push(
                "campaign",
                Some(id),
                "baseline not found in registry or staged ingest payloads",
            );
            continue;
        };
        if !current.is_external() {
            issues.push(
                "campaign",
                Some(id),
                format!(
                    "attestation only allowed for external baselines (source_type={})",
                    current.source_type
                ),
            );
        }
        let mut record = current.clone();

        let patch = match &run.patch_overrides_path {
            Some(path) => {
                checked_patches += 1;
                let target = path.display().to_string();
                let patch: BaselinePatch = match store.load(path) {
                    Ok(p) => p,
                    Err(e) => {
                        issues.push(target, Some(id), e.to_string());
                        continue;
                    }
                };
                let unresolved = patch.unresolved_fields();
                if !unresolved.is_empty() {
                    issues.push(
                        target,
                        Some(id),
                        format!("unresolved fields: {}", unresolved.join(", ")),
                    );
                    continue;
                }
                let placeholders: Vec<&str> = patch
                    .text_fields()
                    .iter()
                    .filter(|(_, f)| f.filled().is_some_and(is_placeholder))
                    .map(|(p, _)| *p)
                    .collect();
                if !placeholders.is_empty() {
                    issues.push(
                        target,
                        Some(id),
                        format!("placeholder values in: {}", placeholders.join(", ")),
                    );
                    continue;
                }
                Some((target, patch))
            }
            None => None,
        };

        let opts = NormalizeOptions {
            align_to: run.align_to_eval.then_some(eval),
            replace_metrics: run.replace_metrics,
            dry_run: true,
        };
        let empty = BaselinePatch::default();
        let (target, patch) = match &patch {
            Some((t, p)) => (t.as_str(), p),
            None => ("campaign", &empty),
        };
        if let Err(e) = apply_patch(&mut record, patch, &opts) {
            issues.push(target, Some(id), e.to_string());
            continue;
        }
        if !shares_metric(&record, eval) {
            issues.push(
                target,
                Some(id),
                "no metric overlap with the eval report after patching",
            );
        }
    }

    tracing::debug!(
        hits = store.hits(),
        misses = store.misses(),
        "validator document store usage"
    );

    let status = if issues.0.is_empty() {
        StepStatus::Ok
    } else {
        StepStatus::Error
    };
    ValidationReport {
        status,
        disclaimer: STAGING_DISCLAIMER.to_string(),
        campaign_digest,
        checked_payloads,
        checked_patches,
        checked_runs: seen.len() as u32,
        issues: issues.0,
    }
}

/// Validate and write `validation.json`.
pub fn write_validation(
    campaign: &CampaignConfig,
    eval: &EvalReport,
    registry_path: &Path,
    layout: &StagingLayout,
    store: &mut DocumentStore,
) -> Result<ValidationReport> {
    let report = validate_campaign(campaign, eval, registry_path, store);
    write_json_file(&layout.validation(), &report)?;
    obs::emit_stage_completed("validator", report.status.as_str(), report.issues.len());
    Ok(report)
}
