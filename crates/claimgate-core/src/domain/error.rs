//! Domain-level error taxonomy for claimgate.

use std::path::PathBuf;

/// Errors produced by record-level validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("required field is blank: {field}")]
    BlankField { field: String },

    #[error("placeholder value '{value}' not allowed for {field}")]
    PlaceholderValue { field: String, value: String },

    #[error("{field} is not an ISO-8601 date: '{value}'")]
    InvalidDate { field: String, value: String },

    #[error("metric {name} must be a finite number")]
    NonNumericMetric { name: String },

    #[error("cannot unset required field: {field}")]
    UnsetRequiredField { field: String },

    #[error("invalid source_type: '{value}'")]
    InvalidSourceType { value: String },
}

/// claimgate domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("duplicate baseline_id in registry: {0}")]
    DuplicateBaseline(String),

    #[error("registry file does not exist: {0}")]
    RegistryMissing(PathBuf),

    #[error("invalid input {path}: {reason}")]
    InvalidInput { path: String, reason: String },

    #[error("invalid campaign: {0}")]
    InvalidCampaign(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClaimError {
    pub(crate) fn input(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        ClaimError::InvalidInput {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for claimgate domain operations.
pub type Result<T> = std::result::Result<T, ClaimError>;
