//! Structured observability hooks for pipeline lifecycle events.
//!
//! This module provides:
//! - an execution-scoped tracing span via the `PromotionSpan` RAII guard
//! - emission functions for comparison, record gates, staging, sandbox
//!   replay and promotion events
//!
//! Events use an `event = "<area>.<what>"` field so they can be filtered in
//! JSON log pipelines.

use tracing::{info, warn};

/// RAII guard that enters a span tagged with a promotion `execution_id`.
pub struct PromotionSpan {
    _span: tracing::span::EnteredSpan,
}

impl PromotionSpan {
    pub fn enter(execution_id: &str) -> Self {
        let span = tracing::info_span!("claimgate.promotion", execution_id = %execution_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_comparison_computed(suite_id: &str, total: u32, comparable: u32) {
    info!(
        event = "comparison.computed",
        suite_id = %suite_id,
        total_baselines = total,
        comparable_baselines = comparable,
    );
}

pub fn emit_baseline_ingested(baseline_id: &str, outcome: &str, downgraded: bool) {
    info!(
        event = "ingestion.accepted",
        baseline_id = %baseline_id,
        outcome = %outcome,
        downgraded = downgraded,
    );
}

/// Emitted when an external baseline claimed verification without replication.
pub fn emit_verification_downgraded(baseline_id: &str) {
    warn!(
        event = "ingestion.verification_downgraded",
        baseline_id = %baseline_id,
        "external baseline claimed verified without internal replication"
    );
}

pub fn emit_ingestion_rejected(origin: &str, reason: &str) {
    warn!(event = "ingestion.rejected", origin = %origin, reason = %reason);
}

pub fn emit_baseline_normalized(baseline_id: &str, changed_fields: usize, dry_run: bool) {
    info!(
        event = "normalization.applied",
        baseline_id = %baseline_id,
        changed_fields = changed_fields,
        dry_run = dry_run,
    );
}

pub fn emit_attestation_recorded(baseline_id: &str, passed: bool, metrics_checked: usize) {
    info!(
        event = "attestation.recorded",
        baseline_id = %baseline_id,
        passed = passed,
        metrics_checked = metrics_checked,
    );
}

pub fn emit_plan_built(rows: usize, recoverable: u32, additional_needed: u32) {
    info!(
        event = "plan.built",
        rows = rows,
        recoverable_external_rows = recoverable,
        additional_baselines_needed = additional_needed,
    );
}

pub fn emit_stage_completed(stage: &str, status: &str, items: usize) {
    info!(event = "staging.completed", stage = %stage, status = %status, items = items);
}

pub fn emit_sandbox_completed(stage_status: &str, source_untouched: bool) {
    if source_untouched {
        info!(event = "sandbox.completed", stage_status = %stage_status, source_untouched = true);
    } else {
        warn!(event = "sandbox.source_modified", stage_status = %stage_status);
    }
}

pub fn emit_promotion_previewed(promotable: bool, confirmation_hash: &str) {
    info!(
        event = "promotion.previewed",
        promotable = promotable,
        required_confirmation_hash = %confirmation_hash,
    );
}

pub fn emit_confirmation_rejected(expected: &str, supplied: &str) {
    warn!(
        event = "promotion.confirmation_rejected",
        expected = %expected,
        supplied = %supplied,
    );
}

pub fn emit_promotion_executed(execution_id: &str, committed: bool) {
    info!(event = "promotion.executed", execution_id = %execution_id, committed = committed);
}

pub fn emit_promotion_rolled_back(execution_id: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "promotion.rolled_back", execution_id = %execution_id, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_span_create() {
        let _span = PromotionSpan::enter("exec-1");
        emit_promotion_executed("exec-1", true);
    }
}
