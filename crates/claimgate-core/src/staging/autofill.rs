//! Autofill stage.
//!
//! Merges a filled evidence map into the scaffold templates and writes one
//! resolved patch per baseline. Merge order per leaf: template, then
//! defaults (only where the template declares the field), then explicit
//! per-baseline values. Blank or `null` values never override.
//!
//! Metric placeholders are a menu: once at least one metric has a value,
//! the remaining `null` metrics are dropped from the resolved patch.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::cache::DocumentStore;
use super::scaffold::ScaffoldReport;
use super::StagingLayout;
use crate::domain::error::Result;
use crate::domain::patch::{BaselinePatch, FieldPatch};
use crate::obs;
use crate::report::{write_json_file, StepStatus, STAGING_DISCLAIMER};

/// Filled values keyed like the evidence schema. Extra top-level keys of
/// the schema document are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceMap {
    #[serde(default)]
    pub defaults: BaselinePatch,
    #[serde(default)]
    pub baselines: BTreeMap<String, BaselinePatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutofillEntry {
    pub baseline_id: String,
    pub resolved_patch_path: PathBuf,
    pub unresolved_fields: Vec<String>,
}

impl AutofillEntry {
    pub fn is_resolved(&self) -> bool {
        self.unresolved_fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutofillReport {
    pub status: StepStatus,
    pub disclaimer: String,
    pub complete: bool,
    pub entries: Vec<AutofillEntry>,
    pub unresolved_baselines: Vec<String>,
    /// Explicit values for baselines the scaffold did not template.
    pub ignored_baselines: Vec<String>,
    pub patch_overrides_path: PathBuf,
    /// baseline_id → resolved patch path, fully resolved baselines only.
    pub patch_overrides: BTreeMap<String, PathBuf>,
}

fn prune_metric_menu(patch: &mut BaselinePatch) {
    if patch
        .metrics
        .values()
        .any(|v| matches!(v, FieldPatch::Set(_)))
    {
        patch.metrics.retain(|_, v| matches!(v, FieldPatch::Set(_)));
    }
}

/// Resolve one template.
pub fn resolve_template(
    mut template: BaselinePatch,
    defaults: &BaselinePatch,
    explicit: Option<&BaselinePatch>,
) -> BaselinePatch {
    template.fill_from_defaults(defaults);
    if let Some(explicit) = explicit {
        template.overlay(explicit);
    }
    prune_metric_menu(&mut template);
    template
}

/// Write `resolved/<id>.patch.json`, `patch_overrides.json` and `autofill.json`.
pub fn autofill(
    scaffold: &ScaffoldReport,
    filled: &EvidenceMap,
    layout: &StagingLayout,
    store: &mut DocumentStore,
) -> Result<AutofillReport> {
    let mut entries = Vec::new();
    let mut patch_overrides = BTreeMap::new();

    for (id, entry) in &scaffold.patch_map {
        let template: BaselinePatch = store.load(&entry.patch_path)?;
        let mut defaults = entry.defaults.clone();
        defaults.overlay(&filled.defaults);

        let mut resolved = resolve_template(template, &defaults, filled.baselines.get(id));
        resolved.baseline_id = Some(id.clone());
        let unresolved_fields = resolved.unresolved_fields();

        let path = layout.resolved_patch(id);
        write_json_file(&path, &resolved)?;
        store.invalidate(&path);
        if unresolved_fields.is_empty() {
            patch_overrides.insert(id.clone(), path.clone());
        }
        entries.push(AutofillEntry {
            baseline_id: id.clone(),
            resolved_patch_path: path,
            unresolved_fields,
        });
    }

    let unresolved_baselines: Vec<String> = entries
        .iter()
        .filter(|e| !e.is_resolved())
        .map(|e| e.baseline_id.clone())
        .collect();
    let ignored_baselines = filled
        .baselines
        .keys()
        .filter(|id| !scaffold.patch_map.contains_key(*id))
        .cloned()
        .collect();

    let overrides_path = layout.patch_overrides();
    write_json_file(&overrides_path, &patch_overrides)?;

    let report = AutofillReport {
        status: StepStatus::Ok,
        disclaimer: STAGING_DISCLAIMER.to_string(),
        complete: unresolved_baselines.is_empty(),
        entries,
        unresolved_baselines,
        ignored_baselines,
        patch_overrides_path: overrides_path,
        patch_overrides,
    };
    write_json_file(&layout.autofill(), &report)?;
    obs::emit_stage_completed("autofill", report.status.as_str(), report.entries.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(v: serde_json::Value) -> BaselinePatch {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn explicit_beats_default_beats_template() {
        let template = patch(json!({"suite_id": "", "source": "", "evidence": {"citation": ""}}));
        let defaults = patch(json!({"suite_id": "s1", "source": "default source", "label": "not in template"}));
        let explicit = patch(json!({"source": "explicit source", "evidence": {"citation": ""}}));
        let resolved = resolve_template(template, &defaults, Some(&explicit));
        assert_eq!(resolved.suite_id, FieldPatch::Set("s1".into()));
        assert_eq!(resolved.source, FieldPatch::Set("explicit source".into()));
        assert!(resolved.label.is_keep());
        assert_eq!(resolved.unresolved_fields(), vec!["evidence.citation"]);
    }

    #[test]
    fn metric_menu_is_pruned_once_one_is_set() {
        let template = patch(json!({"metrics": {"quality": null, "coverage": null}}));
        let explicit = patch(json!({"metrics": {"quality": 0.895}}));
        let resolved = resolve_template(template.clone(), &BaselinePatch::default(), Some(&explicit));
        assert_eq!(resolved.metrics.len(), 1);
        assert!(resolved.unresolved_fields().is_empty());

        let untouched = resolve_template(template, &BaselinePatch::default(), None);
        assert_eq!(untouched.unresolved_fields().len(), 2);
    }

    #[test]
    fn evidence_map_tolerates_schema_metadata() {
        let map: EvidenceMap = serde_json::from_value(json!({
            "schema_version": "1",
            "suite_id": "s1",
            "instructions": "fill me",
            "defaults": {},
            "baselines": {"ext-a": {"source": "x"}}
        }))
        .unwrap();
        assert_eq!(map.baselines.len(), 1);
    }
}
