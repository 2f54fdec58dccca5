//! Baseline normalization gate.
//!
//! Applies an explicit [`BaselinePatch`] to an existing baseline. The whole
//! patch is validated before anything is applied: placeholder or blank text,
//! non-ISO dates, unset required fields and null metrics reject the patch.
//! Optionally aligns `suite_id`/`scoring_protocol` to an eval report.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::baseline::{BaselineRecord, SourceType};
use crate::domain::error::{ClaimError, Result, ValidationError};
use crate::domain::eval::EvalReport;
use crate::domain::patch::{BaselinePatch, FieldPatch};
use crate::domain::registry::Registry;
use crate::domain::validation::{require_date, require_metric, require_text};
use crate::obs;
use crate::report::{StepStatus, NORMALIZATION_DISCLAIMER};

/// Text fields that may be cleared with an explicit `null`.
const CLEARABLE_FIELDS: [&str; 1] = ["notes"];

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    /// Align `suite_id` and `scoring_protocol` to this report.
    pub align_to: Option<&'a EvalReport>,
    /// Replace the metric map with the patch's metrics instead of merging.
    pub replace_metrics: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub baseline_id: String,
    pub patch_path: Option<String>,
    pub changed_fields: Vec<String>,
    pub aligned_to_eval: bool,
    pub dry_run: bool,
    pub reason: Option<String>,
}

impl NormalizationReport {
    fn new(baseline_id: &str, opts: &NormalizeOptions<'_>) -> Self {
        Self {
            status: StepStatus::Ok,
            disclaimer: NORMALIZATION_DISCLAIMER.to_string(),
            baseline_id: baseline_id.to_string(),
            patch_path: None,
            changed_fields: Vec::new(),
            aligned_to_eval: opts.align_to.is_some(),
            dry_run: opts.dry_run,
            reason: None,
        }
    }

    fn failed(mut self, reason: impl std::fmt::Display) -> Self {
        self.status = StepStatus::Error;
        self.changed_fields.clear();
        self.reason = Some(reason.to_string());
        self
    }
}

fn validate_patch(patch: &BaselinePatch) -> std::result::Result<(), ValidationError> {
    for (path, leaf) in patch.text_fields() {
        match leaf {
            FieldPatch::Keep => {}
            FieldPatch::Unset if CLEARABLE_FIELDS.contains(&path) => {}
            FieldPatch::Unset => {
                return Err(ValidationError::UnsetRequiredField {
                    field: path.to_string(),
                })
            }
            FieldPatch::Set(value) => match path {
                "source_date" => require_date(path, value, false)?,
                "evidence.retrieval_date" => require_date(path, value, true)?,
                "source_type" => {
                    value.parse::<SourceType>()?;
                }
                _ => require_text(path, value)?,
            },
        }
    }
    if matches!(patch.enabled, FieldPatch::Unset) {
        return Err(ValidationError::UnsetRequiredField {
            field: "enabled".to_string(),
        });
    }
    for (name, value) in &patch.metrics {
        match value {
            FieldPatch::Set(v) => require_metric(name, *v)?,
            _ => {
                return Err(ValidationError::NonNumericMetric {
                    name: name.clone(),
                })
            }
        }
    }
    Ok(())
}

fn assign(slot: &mut Option<String>, leaf: &FieldPatch<String>) {
    match leaf {
        FieldPatch::Keep => {}
        FieldPatch::Set(v) => *slot = Some(v.trim().to_string()),
        FieldPatch::Unset => *slot = None,
    }
}

fn diff_fields(before: &BaselineRecord, after: &BaselineRecord) -> Vec<String> {
    let mut changed = Vec::new();
    let text = [
        ("label", &before.label, &after.label),
        ("source", &before.source, &after.source),
        ("source_date", &before.source_date, &after.source_date),
        ("suite_id", &before.suite_id, &after.suite_id),
        ("scoring_protocol", &before.scoring_protocol, &after.scoring_protocol),
        ("notes", &before.notes, &after.notes),
        ("evidence.citation", &before.evidence.citation, &after.evidence.citation),
        (
            "evidence.artifact_hash",
            &before.evidence.artifact_hash,
            &after.evidence.artifact_hash,
        ),
        (
            "evidence.retrieval_date",
            &before.evidence.retrieval_date,
            &after.evidence.retrieval_date,
        ),
        (
            "evidence.verification_method",
            &before.evidence.verification_method,
            &after.evidence.verification_method,
        ),
    ];
    for (path, b, a) in text {
        if b != a {
            changed.push(path.to_string());
        }
    }
    if before.source_type != after.source_type {
        changed.push("source_type".to_string());
    }
    if before.enabled != after.enabled {
        changed.push("enabled".to_string());
    }
    let names: std::collections::BTreeSet<&String> =
        before.metrics.keys().chain(after.metrics.keys()).collect();
    for name in names {
        if before.metrics.get(name) != after.metrics.get(name) {
            changed.push(format!("metrics.{name}"));
        }
    }
    changed.sort();
    changed
}

/// Apply `patch` to `record` and return the dotted paths that changed.
///
/// The record is only modified when the whole patch validates.
pub fn apply_patch(
    record: &mut BaselineRecord,
    patch: &BaselinePatch,
    opts: &NormalizeOptions<'_>,
) -> Result<Vec<String>> {
    if let Some(guard) = patch.baseline_id.as_deref() {
        if guard.trim() != record.baseline_id {
            return Err(ClaimError::input(
                "patch",
                format!(
                    "baseline_id '{}' does not match target '{}'",
                    guard.trim(),
                    record.baseline_id
                ),
            ));
        }
    }
    validate_patch(patch)?;

    let mut next = record.clone();
    assign(&mut next.label, &patch.label);
    assign(&mut next.source, &patch.source);
    assign(&mut next.source_date, &patch.source_date);
    assign(&mut next.suite_id, &patch.suite_id);
    assign(&mut next.scoring_protocol, &patch.scoring_protocol);
    assign(&mut next.notes, &patch.notes);
    assign(&mut next.evidence.citation, &patch.evidence.citation);
    assign(&mut next.evidence.artifact_hash, &patch.evidence.artifact_hash);
    assign(&mut next.evidence.retrieval_date, &patch.evidence.retrieval_date);
    assign(
        &mut next.evidence.verification_method,
        &patch.evidence.verification_method,
    );
    if let FieldPatch::Set(raw) = &patch.source_type {
        next.source_type = raw.parse::<SourceType>()?;
    }
    if let FieldPatch::Set(enabled) = patch.enabled {
        next.enabled = enabled;
    }

    let patched: BTreeMap<String, f64> = patch
        .metrics
        .iter()
        .filter_map(|(k, v)| v.as_set().map(|v| (k.clone(), *v)))
        .collect();
    if opts.replace_metrics && !patched.is_empty() {
        next.metrics = patched;
    } else {
        next.metrics.extend(patched);
    }

    if let Some(eval) = opts.align_to {
        next.suite_id = Some(eval.suite_id().to_string());
        next.scoring_protocol = Some(eval.scoring_reference().to_string());
    }

    let changed = diff_fields(record, &next);
    *record = next;
    Ok(changed)
}

/// Normalize one baseline of an in-memory registry. Never creates a baseline.
pub fn normalize_in_registry(
    registry: &mut Registry,
    baseline_id: &str,
    patch: &BaselinePatch,
    opts: &NormalizeOptions<'_>,
) -> NormalizationReport {
    let report = NormalizationReport::new(baseline_id, opts);
    let Some(record) = registry.get_mut(baseline_id) else {
        return report.failed(ClaimError::BaselineNotFound(baseline_id.to_string()));
    };
    match apply_patch(record, patch, opts) {
        Ok(changed) => {
            obs::emit_baseline_normalized(baseline_id, changed.len(), opts.dry_run);
            NormalizationReport {
                changed_fields: changed,
                ..report
            }
        }
        Err(e) => report.failed(e),
    }
}

/// Normalize a baseline in the registry file.
///
/// Without a `patch_path` only the eval alignment (if any) is applied. The
/// file is rewritten only when something changed and `dry_run` is off.
pub fn normalize_file(
    registry_path: &Path,
    baseline_id: &str,
    patch_path: Option<&Path>,
    opts: &NormalizeOptions<'_>,
) -> NormalizationReport {
    let mut report = NormalizationReport::new(baseline_id, opts);
    report.patch_path = patch_path.map(|p| p.display().to_string());

    let patch = match patch_path {
        Some(p) => match BaselinePatch::load(p) {
            Ok(patch) => patch,
            Err(e) => return report.failed(e),
        },
        None => BaselinePatch::default(),
    };
    let mut registry = match Registry::load(registry_path) {
        Ok(r) => r,
        Err(e) => return report.failed(e),
    };

    let outcome = normalize_in_registry(&mut registry, baseline_id, &patch, opts);
    report = NormalizationReport {
        patch_path: report.patch_path,
        ..outcome
    };
    if !report.status.is_ok() || opts.dry_run || report.changed_fields.is_empty() {
        return report;
    }
    if let Err(e) = registry.save(registry_path) {
        return report.failed(format!("cannot write registry: {e}"));
    }
    report
}
