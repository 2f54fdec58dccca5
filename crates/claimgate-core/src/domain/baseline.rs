//! Baseline records: one declared comparison point each.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a baseline's numbers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Published by a third party; must be replicated before it can back a claim.
    ExternalReported,
    /// Produced by our own harness.
    InternalReference,
}

impl SourceType {
    pub fn is_external(self) -> bool {
        matches!(self, SourceType::ExternalReported)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::ExternalReported => "external_reported",
            SourceType::InternalReference => "internal_reference",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = super::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "external_reported" => Ok(SourceType::ExternalReported),
            "internal_reference" => Ok(SourceType::InternalReference),
            other => Err(super::error::ValidationError::InvalidSourceType {
                value: other.to_string(),
            }),
        }
    }
}

/// Replication state of a baseline's evidence in our own harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplicationStatus {
    #[default]
    Pending,
    ReplicatedInternalHarness,
    ReplicationFailed,
}

impl ReplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplicationStatus::Pending => "pending",
            ReplicationStatus::ReplicatedInternalHarness => "replicated-internal-harness",
            ReplicationStatus::ReplicationFailed => "replication-failed",
        }
    }
}

impl fmt::Display for ReplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit stamp left by a successful attestation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub attested_at: DateTime<Utc>,
    pub suite_id: String,
    pub scoring_protocol: String,
    pub max_metric_delta: f64,
    pub metrics_checked: Vec<String>,
    pub reasons: Vec<String>,
}

/// Provenance for a baseline's reported numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub citation: Option<String>,
    #[serde(default)]
    pub artifact_hash: Option<String>,
    #[serde(default)]
    pub retrieval_date: Option<String>,
    #[serde(default)]
    pub verification_method: Option<String>,
    #[serde(default)]
    pub replication_status: ReplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationRecord>,
}

impl Evidence {
    /// The four evidence fields every baseline must fill, by name.
    pub const REQUIRED_FIELDS: [&'static str; 4] = [
        "citation",
        "artifact_hash",
        "retrieval_date",
        "verification_method",
    ];

    /// Look up one of [`Evidence::REQUIRED_FIELDS`].
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "citation" => self.citation.as_deref(),
            "artifact_hash" => self.artifact_hash.as_deref(),
            "retrieval_date" => self.retrieval_date.as_deref(),
            "verification_method" => self.verification_method.as_deref(),
            _ => None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One declared comparison baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub baseline_id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub source_type: SourceType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_date: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub suite_id: Option<String>,
    #[serde(default)]
    pub scoring_protocol: Option<String>,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BaselineRecord {
    /// A minimal, enabled, unverified record.
    pub fn new(baseline_id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            baseline_id: baseline_id.into(),
            label: None,
            source_type,
            source: None,
            source_date: None,
            verified: false,
            enabled: true,
            suite_id: None,
            scoring_protocol: None,
            evidence: Evidence::default(),
            metrics: BTreeMap::new(),
            notes: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.source_type.is_external()
    }

    /// External baselines may only stay verified once replicated in our harness.
    pub fn is_over_claimed(&self) -> bool {
        self.is_external()
            && self.verified
            && self.evidence.replication_status != ReplicationStatus::ReplicatedInternalHarness
    }
}
