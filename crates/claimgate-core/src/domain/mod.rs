//! Domain models for claimgate.
//!
//! Canonical definitions for the core entities:
//! - `BaselineRecord` / `Registry`: the persisted baseline registry
//! - `EvalReport`: observed metrics from the external evaluator
//! - `ReleaseStatus`: pass/fail gates for external claims
//! - `ClaimPolicy`: release thresholds and promotion gates
//! - `BaselinePatch`: typed corrections applied by normalization

pub mod baseline;
pub mod digest;
pub mod error;
pub mod eval;
pub mod patch;
pub mod policy;
pub mod registry;
pub mod release;
pub mod validation;

// Re-export main types and errors
pub use baseline::{AttestationRecord, BaselineRecord, Evidence, ReplicationStatus, SourceType};
pub use error::{ClaimError, Result, ValidationError};
pub use eval::{BenchmarkGaps, BenchmarkProgress, BenchmarkProvenance, ClaimCalibration, EvalReport};
pub use patch::{BaselinePatch, EvidencePatch, FieldPatch};
pub use policy::{ClaimPolicy, DistanceCeiling, PromotionGates, ReleasePolicy};
pub use registry::{Registry, UpsertOutcome, REGISTRY_VERSION};
pub use release::{
    DistanceDelta, DistanceSnapshot, ReleaseStatus, ReleaseStatusEvaluator, CALIBRATION_METRICS,
};
