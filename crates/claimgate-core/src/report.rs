//! Shared report plumbing.
//!
//! Every pipeline operation returns a self-describing JSON object with a
//! `status`, a human-readable `disclaimer`, and structured detail. This
//! module holds the disclaimers, the common step status, and file helpers.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::comparability::ComparisonReport;
use crate::domain::error::ClaimError;

pub const COMPARISON_DISCLAIMER: &str =
    "Comparability is derived from declared registry metadata; no benchmark was re-run.";
pub const PLAN_DISCLAIMER: &str =
    "Remediation plan only; no registry state was modified.";
pub const INGESTION_DISCLAIMER: &str =
    "Ingestion records declared values; verification requires attestation against the internal harness.";
pub const NORMALIZATION_DISCLAIMER: &str =
    "Normalization applies caller-supplied corrections verbatim; it does not verify them.";
pub const ATTESTATION_DISCLAIMER: &str =
    "Attestation compares declared metrics to observed metrics within a tolerance; it is not an independent audit.";
pub const STAGING_DISCLAIMER: &str =
    "Staged files only; the authoritative registry was not modified.";
pub const SANDBOX_DISCLAIMER: &str =
    "Projection computed on a disposable copy of the registry; the source registry was not modified.";
pub const EXECUTE_DISCLAIMER: &str =
    "Execution mutates the authoritative registry only when every promotion gate passes; otherwise the prior bytes are restored.";
pub const READINESS_DISCLAIMER: &str =
    "Readiness summarises staged artifacts; it never triggers execution.";

/// Outcome of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Error,
}

impl StepStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, StepStatus::Ok)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Ok => "ok",
            StepStatus::Error => "error",
        }
    }
}

/// Read and parse a JSON file, mapping failures to an input error for that file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> crate::domain::Result<T> {
    let bytes = std::fs::read(path)
        .map_err(|e| ClaimError::input(path.display(), format!("cannot read: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClaimError::input(path.display(), format!("malformed JSON: {e}")))
}

/// Serialize `value` as pretty JSON with a trailing newline.
pub fn to_json_bytes<T: Serialize>(value: &T) -> crate::domain::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write a staged file deterministically.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> crate::domain::Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, to_json_bytes(value)?)?;
    Ok(())
}

/// Write a report artifact in pretty JSON format.
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render a comparison report as a markdown table for review comments.
pub fn render_comparison_md(report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str("# Baseline Comparability\n\n");
    out.push_str(&format!(
        "- suite: `{}`\n- scoring protocol: `{}`\n- comparable: {} of {} ({} external)\n\n",
        report.suite_id,
        report.scoring_protocol,
        report.summary.comparable_baselines,
        report.summary.total_baselines,
        report.summary.comparable_external_baselines
    ));

    if report.rows.is_empty() {
        out.push_str("_no baselines configured_\n");
        return out;
    }

    out.push_str("| baseline | source | comparable | W/L/T | reasons |\n");
    out.push_str("|---|---|---|---|---|\n");
    for row in &report.rows {
        let reasons: Vec<String> = row
            .comparability
            .reasons
            .iter()
            .map(ToString::to_string)
            .collect();
        out.push_str(&format!(
            "| `{}` | {} | {} | {}/{}/{} | {} |\n",
            row.baseline_id,
            row.source_type,
            if row.is_comparable() { "yes" } else { "no" },
            row.wins,
            row.losses,
            row.ties,
            if reasons.is_empty() {
                "-".to_string()
            } else {
                reasons.join("; ")
            }
        ));
    }
    out.push_str(&format!("\n> {}\n", report.disclaimer));
    out
}

/// Write a rendered markdown document.
pub fn write_markdown(path: &Path, markdown: &str) -> Result<()> {
    std::fs::write(path, markdown).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
