//! claimgate Core Library
//!
//! Decides when a declared comparison baseline may back an external claim,
//! and moves a registry towards that point through a staged, sandboxed,
//! hash-confirmed promotion pipeline.

pub mod comparability;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod planner;
pub mod promotion;
pub mod quality_gates;
pub mod report;
pub mod sandbox;
pub mod staging;
pub mod telemetry;

/// Crate version, shared by the whole workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use domain::{
    AttestationRecord, BaselinePatch, BaselineRecord, ClaimError, ClaimPolicy, DistanceCeiling,
    DistanceDelta, DistanceSnapshot, EvalReport, Evidence, EvidencePatch, FieldPatch,
    PromotionGates, Registry, ReleasePolicy, ReleaseStatus, ReleaseStatusEvaluator,
    ReplicationStatus, Result, SourceType, UpsertOutcome, ValidationError,
};

pub use comparability::{
    assess_baseline, compare, compare_path, ComparisonReport, ComparisonRow, ComparisonStatus,
    ComparisonSummary, Reason,
};

pub use quality_gates::{
    apply_patch, attest_file, attest_in_registry, attest_record, ingest_payload_file,
    ingest_record, normalize_file, normalize_in_registry, rejection_reasons, AttestOptions,
    AttestationReport, IngestionReport, NormalizationReport, NormalizeOptions,
};

pub use planner::{actions_for, plan, plan_for_registry, ActionType, ClaimPlan, RowPlan};

pub use staging::{
    assess_readiness, autofill, build_evidence_schema, draft, scaffold, validate_campaign,
    AutofillReport, BaselineRun, CampaignConfig, DocumentStore, DraftReport, EvidenceMap,
    EvidenceSchema, ReadinessReport, ReadinessState, ScaffoldReport, StagingLayout,
    ValidationReport,
};

pub use sandbox::{
    file_sha256, replay_campaign, run_baseline_pipeline, run_campaign, RegistrySandbox,
    SandboxError, StageStatus,
};

pub use promotion::{
    evaluate_promotion_gates, execute_promotion, preview_promotion, PromotionExecution,
    PromotionPreview, PromotionRule, PromotionVerdict, PromotionViolation,
};

pub use report::StepStatus;
