//! Record-level quality gates.
//!
//! Three gates mutate individual baseline records:
//!
//! - [`ingestion`]: accept or reject a standalone baseline payload
//!   (insert-or-update), downgrading over-claimed external verification
//! - [`normalization`]: apply an explicit typed patch to an existing baseline
//! - [`attestation`]: compare declared metrics with observed metrics and
//!   flip verification/replication status accordingly
//!
//! Each gate has an in-memory form operating on a [`Registry`](crate::domain::Registry)
//! and a file form that loads, mutates and rewrites the registry file. File
//! forms never return `Err`: failures come back as a report with
//! `status: error` and a `reason`.

pub mod attestation;
pub mod ingestion;
pub mod normalization;

pub use attestation::{
    attest_file, attest_in_registry, attest_record, AttestOptions, AttestationOutcome,
    AttestationReport, MetricCheck, DEFAULT_MAX_METRIC_DELTA,
};
pub use ingestion::{ingest_payload_file, ingest_record, rejection_reasons, IngestionReport};
pub use normalization::{
    apply_patch, normalize_file, normalize_in_registry, NormalizationReport, NormalizeOptions,
};
