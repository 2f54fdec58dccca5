//! Evidence-schema stage.
//!
//! Folds the scaffold's defaults and per-baseline templates into one fill-in
//! document. The filled document is read back by autofill as an
//! [`EvidenceMap`](super::autofill::EvidenceMap).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cache::DocumentStore;
use super::scaffold::ScaffoldReport;
use super::StagingLayout;
use crate::domain::error::Result;
use crate::domain::patch::BaselinePatch;
use crate::obs;
use crate::report::write_json_file;

pub const EVIDENCE_SCHEMA_VERSION: &str = "1";

const INSTRUCTIONS: &str = "Replace every \"\" and null with a real value. \
Values under `defaults` apply to every baseline that still has a placeholder for that field; \
values under `baselines.<id>` override defaults. Placeholder words such as 'unknown' or 'tbd' are rejected.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSchema {
    pub schema_version: String,
    pub suite_id: String,
    pub instructions: String,
    pub defaults: BaselinePatch,
    pub baselines: BTreeMap<String, BaselinePatch>,
    pub ingest_payloads_needed: u32,
}

impl EvidenceSchema {
    /// Placeholder leaves still waiting for a value, per baseline.
    pub fn open_fields(&self) -> BTreeMap<&str, Vec<String>> {
        self.baselines
            .iter()
            .map(|(id, p)| (id.as_str(), p.unresolved_fields()))
            .filter(|(_, f)| !f.is_empty())
            .collect()
    }
}

/// Build the schema from a scaffold, reading templates through `store`.
pub fn build_evidence_schema(scaffold: &ScaffoldReport, store: &mut DocumentStore) -> Result<EvidenceSchema> {
    let mut baselines = BTreeMap::new();
    for (id, entry) in &scaffold.patch_map {
        let mut template: BaselinePatch = store.load(&entry.patch_path)?;
        template.baseline_id = None;
        baselines.insert(id.clone(), template);
    }
    Ok(EvidenceSchema {
        schema_version: EVIDENCE_SCHEMA_VERSION.to_string(),
        suite_id: scaffold.suite_id.clone(),
        instructions: INSTRUCTIONS.to_string(),
        defaults: scaffold.defaults.clone(),
        baselines,
        ingest_payloads_needed: scaffold.additional_baselines_needed,
    })
}

/// Build and write `evidence_schema.json`.
pub fn write_evidence_schema(
    scaffold: &ScaffoldReport,
    layout: &StagingLayout,
    store: &mut DocumentStore,
) -> Result<EvidenceSchema> {
    let schema = build_evidence_schema(scaffold, store)?;
    write_json_file(&layout.evidence_schema(), &schema)?;
    obs::emit_stage_completed("evidence_schema", "ok", schema.baselines.len());
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patch::FieldPatch;
    use crate::report::{StepStatus, STAGING_DISCLAIMER};
    use crate::staging::scaffold::PatchMapEntry;

    #[test]
    fn schema_collects_templates_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StagingLayout::new(dir.path());
        let template = BaselinePatch {
            baseline_id: Some("ext-a".to_string()),
            source_date: FieldPatch::placeholder(),
            ..BaselinePatch::default()
        };
        let path = layout.patch_template("ext-a");
        write_json_file(&path, &template).unwrap();

        let defaults = BaselinePatch {
            suite_id: FieldPatch::Set("s1".to_string()),
            ..BaselinePatch::default()
        };
        let scaffold = ScaffoldReport {
            status: StepStatus::Ok,
            disclaimer: STAGING_DISCLAIMER.to_string(),
            suite_id: "s1".to_string(),
            defaults: defaults.clone(),
            patch_map: BTreeMap::from([(
                "ext-a".to_string(),
                PatchMapEntry {
                    patch_path: path,
                    defaults,
                },
            )]),
            attest_only: vec![],
            ingest_manifest_path: layout.ingest_manifest(),
            additional_baselines_needed: 2,
        };

        let mut store = DocumentStore::new();
        let schema = write_evidence_schema(&scaffold, &layout, &mut store).unwrap();
        assert_eq!(schema.ingest_payloads_needed, 2);
        assert_eq!(schema.open_fields()["ext-a"], vec!["source_date"]);
        assert!(schema.baselines["ext-a"].baseline_id.is_none());
        assert!(layout.evidence_schema().exists());
    }
}
