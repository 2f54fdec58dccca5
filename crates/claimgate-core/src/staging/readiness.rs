//! Readiness stage.
//!
//! Folds draft, validation and an optional preview into a single state.
//! Readiness is read-only; it never runs a preview or an execute.

use serde::{Deserialize, Serialize};

use super::draft::{DraftReport, DraftStatus};
use super::validator::ValidationReport;
use super::StagingLayout;
use crate::domain::error::{ClaimError, Result};
use crate::obs;
use crate::promotion::PromotionPreview;
use crate::report::{write_json_file, StepStatus, READINESS_DISCLAIMER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessState {
    Blocked,
    ReadyForPreview,
    PreviewGateFailed,
    ReadyForExecute,
}

impl ReadinessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadinessState::Blocked => "blocked",
            ReadinessState::ReadyForPreview => "ready-for-preview",
            ReadinessState::PreviewGateFailed => "preview-gate-failed",
            ReadinessState::ReadyForExecute => "ready-for-execute",
        }
    }

    fn next_step(self) -> &'static str {
        match self {
            ReadinessState::Blocked => "resolve the listed blockers and re-run draft and validate",
            ReadinessState::ReadyForPreview => "run `claimgate preview` on the campaign",
            ReadinessState::PreviewGateFailed => {
                "revise evidence or patches; the previewed campaign does not pass promotion gates"
            }
            ReadinessState::ReadyForExecute => {
                "run `claimgate execute` with the preview's confirmation hash"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub status: ReadinessState,
    pub disclaimer: String,
    pub campaign_digest: String,
    pub draft_status: DraftStatus,
    pub validation_status: StepStatus,
    pub preview_promotable: Option<bool>,
    /// Only carried when the state is `ready-for-execute`.
    pub required_confirmation_hash: Option<String>,
    pub blockers: Vec<String>,
    pub next_step: String,
}

/// Decide how far a campaign has come.
pub fn assess_readiness(
    draft: &DraftReport,
    validation: &ValidationReport,
    preview: Option<&PromotionPreview>,
) -> ReadinessReport {
    let mut blockers = Vec::new();

    for dep in &draft.unresolved_dependencies {
        blockers.push(format!("draft: {}", dep.detail));
    }
    if !draft.is_ready() && draft.unresolved_dependencies.is_empty() {
        blockers.push("draft: campaign is not ready".to_string());
    }
    for issue in &validation.issues {
        blockers.push(format!("validation: {}: {}", issue.target, issue.message));
    }
    if draft.campaign_digest != validation.campaign_digest {
        let mismatch = ClaimError::DigestMismatch {
            expected: draft.campaign_digest.clone(),
            actual: validation.campaign_digest.clone(),
        };
        blockers.push(format!(
            "validation was run against a different campaign than the draft: {mismatch}"
        ));
    }
    if let Some(preview) = preview {
        if preview.campaign_digest.as_deref() != Some(validation.campaign_digest.as_str()) {
            let mismatch = ClaimError::DigestMismatch {
                expected: validation.campaign_digest.clone(),
                actual: preview.campaign_digest.clone().unwrap_or_else(|| "none".to_string()),
            };
            blockers.push(format!(
                "preview was run against a different campaign than the one validated: {mismatch}"
            ));
        }
        if !preview.status.is_ok() {
            blockers.push(format!("preview: {}", preview.reasons.join("; ")));
        }
    }

    let state = if !blockers.is_empty() {
        ReadinessState::Blocked
    } else {
        match preview {
            None => ReadinessState::ReadyForPreview,
            Some(p) if !p.promotable => {
                blockers.extend(p.reasons.iter().map(|r| format!("preview gate: {r}")));
                ReadinessState::PreviewGateFailed
            }
            Some(_) => ReadinessState::ReadyForExecute,
        }
    };

    let required_confirmation_hash = match (state, preview) {
        (ReadinessState::ReadyForExecute, Some(p)) => p.required_confirmation_hash.clone(),
        _ => None,
    };

    ReadinessReport {
        status: state,
        disclaimer: READINESS_DISCLAIMER.to_string(),
        campaign_digest: validation.campaign_digest.clone(),
        draft_status: draft.status,
        validation_status: validation.status,
        preview_promotable: preview.map(|p| p.promotable),
        required_confirmation_hash,
        blockers,
        next_step: state.next_step().to_string(),
    }
}

/// Assess and write `readiness.json`.
pub fn write_readiness(
    draft: &DraftReport,
    validation: &ValidationReport,
    preview: Option<&PromotionPreview>,
    layout: &StagingLayout,
) -> Result<ReadinessReport> {
    let report = assess_readiness(draft, validation, preview);
    write_json_file(&layout.readiness(), &report)?;
    obs::emit_stage_completed("readiness", report.status.as_str(), report.blockers.len());
    Ok(report)
}
