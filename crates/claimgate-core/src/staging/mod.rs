//! Campaign staging pipeline.
//!
//! Independent, file-producing stages that turn a [`ClaimPlan`](crate::planner::ClaimPlan)
//! into reviewable inputs for a promotion campaign. No stage ever writes the
//! authoritative registry.
//!
//! ```text
//! plan ─▶ scaffold ─▶ evidence_schema ─▶ (human fills) ─▶ autofill ─▶ draft ─▶ validator ─▶ readiness
//! ```
//!
//! Stages communicate through files under one staging directory
//! ([`StagingLayout`]); a per-run [`DocumentStore`] avoids re-parsing the
//! same file twice.

pub mod autofill;
pub mod cache;
pub mod draft;
pub mod evidence_schema;
pub mod readiness;
pub mod scaffold;
pub mod validator;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::digest::digest_of;
use crate::domain::error::{ClaimError, Result};
use crate::quality_gates::attestation::DEFAULT_MAX_METRIC_DELTA;
use crate::report::read_json;

pub use autofill::{autofill, AutofillEntry, AutofillReport, EvidenceMap};
pub use cache::DocumentStore;
pub use draft::{
    draft, load_patch_overrides, write_draft, DependencyKind, DraftOptions, DraftReport,
    DraftStatus, UnresolvedDependency,
};
pub use evidence_schema::{build_evidence_schema, write_evidence_schema, EvidenceSchema};
pub use readiness::{assess_readiness, write_readiness, ReadinessReport, ReadinessState};
pub use scaffold::{scaffold, IngestManifest, PatchMapEntry, ScaffoldReport};
pub use validator::{validate_campaign, write_validation, ValidationIssue, ValidationReport};

/// Make a baseline id safe to use as a file name.
pub fn sanitize_id(baseline_id: &str) -> String {
    let cleaned: String = baseline_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// File layout of a staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    root: PathBuf,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scaffold(&self) -> PathBuf {
        self.root.join("scaffold.json")
    }

    pub fn patch_template(&self, baseline_id: &str) -> PathBuf {
        self.root
            .join("patches")
            .join(format!("{}.patch.json", sanitize_id(baseline_id)))
    }

    pub fn ingest_manifest(&self) -> PathBuf {
        self.root.join("ingest_manifest.json")
    }

    pub fn evidence_schema(&self) -> PathBuf {
        self.root.join("evidence_schema.json")
    }

    pub fn resolved_patch(&self, baseline_id: &str) -> PathBuf {
        self.root
            .join("resolved")
            .join(format!("{}.patch.json", sanitize_id(baseline_id)))
    }

    pub fn patch_overrides(&self) -> PathBuf {
        self.root.join("patch_overrides.json")
    }

    pub fn autofill(&self) -> PathBuf {
        self.root.join("autofill.json")
    }

    pub fn campaign(&self) -> PathBuf {
        self.root.join("campaign.json")
    }

    pub fn draft(&self) -> PathBuf {
        self.root.join("draft.json")
    }

    pub fn validation(&self) -> PathBuf {
        self.root.join("validation.json")
    }

    pub fn readiness(&self) -> PathBuf {
        self.root.join("readiness.json")
    }
}

fn default_true() -> bool {
    true
}

fn default_max_metric_delta() -> f64 {
    DEFAULT_MAX_METRIC_DELTA
}

/// One baseline step of a campaign: optional normalize, then attest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRun {
    pub baseline_id: String,
    #[serde(default)]
    pub patch_overrides_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub align_to_eval: bool,
    #[serde(default)]
    pub replace_metrics: bool,
    #[serde(default = "default_max_metric_delta")]
    pub max_metric_delta: f64,
    #[serde(default)]
    pub dry_run: bool,
}

impl BaselineRun {
    pub fn new(baseline_id: impl Into<String>) -> Self {
        Self {
            baseline_id: baseline_id.into(),
            patch_overrides_path: None,
            align_to_eval: true,
            replace_metrics: false,
            max_metric_delta: DEFAULT_MAX_METRIC_DELTA,
            dry_run: false,
        }
    }
}

/// A staged promotion campaign. Holds file references only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default)]
    pub ingest_payload_paths: Vec<PathBuf>,
    #[serde(default)]
    pub baseline_runs: Vec<BaselineRun>,
}

impl CampaignConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Canonical digest of the campaign, used to tie validation, preview
    /// and readiness to the same campaign.
    pub fn digest(&self) -> Result<String> {
        digest_of(self)
    }

    pub fn is_empty(&self) -> bool {
        self.ingest_payload_paths.is_empty() && self.baseline_runs.is_empty()
    }

    /// Baseline ids targeted by more than one run, sorted.
    pub fn duplicate_baseline_ids(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for run in &self.baseline_runs {
            *counts.entry(run.baseline_id.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Reject campaigns that target one baseline twice.
    pub fn ensure_unique_runs(&self) -> Result<()> {
        let dups = self.duplicate_baseline_ids();
        if dups.is_empty() {
            Ok(())
        } else {
            Err(ClaimError::InvalidCampaign(format!(
                "baseline_runs target the same baseline more than once: {}",
                dups.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_sanitized_for_file_names() {
        assert_eq!(sanitize_id("vendor/model v2"), "vendor_model_v2");
        assert_eq!(sanitize_id("ext-a.1_b"), "ext-a.1_b");
        assert_eq!(sanitize_id(".."), "_");
        let layout = StagingLayout::new("/tmp/stage");
        assert_eq!(
            layout.patch_template("a/b"),
            PathBuf::from("/tmp/stage/patches/a_b.patch.json")
        );
    }

    #[test]
    fn run_defaults_apply_on_parse() {
        let campaign: CampaignConfig = serde_json::from_value(json!({
            "baseline_runs": [{"baseline_id": "ext-a"}]
        }))
        .unwrap();
        let run = &campaign.baseline_runs[0];
        assert!(run.align_to_eval);
        assert!(!run.replace_metrics);
        assert_eq!(run.max_metric_delta, 0.02);
        assert!(campaign.ingest_payload_paths.is_empty());
    }

    #[test]
    fn duplicate_runs_are_detected() {
        let campaign = CampaignConfig {
            ingest_payload_paths: vec![],
            baseline_runs: vec![
                BaselineRun::new("b"),
                BaselineRun::new("a"),
                BaselineRun::new("b"),
            ],
        };
        assert_eq!(campaign.duplicate_baseline_ids(), vec!["b"]);
        assert!(matches!(
            campaign.ensure_unique_runs(),
            Err(ClaimError::InvalidCampaign(_))
        ));
    }

    #[test]
    fn digest_tracks_content() {
        let a = CampaignConfig {
            ingest_payload_paths: vec![],
            baseline_runs: vec![BaselineRun::new("a")],
        };
        let mut b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        b.baseline_runs[0].max_metric_delta = 0.05;
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
