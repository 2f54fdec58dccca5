//! Error types for the sandbox module.

use std::path::PathBuf;

/// Errors produced by the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("source registry does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("sandbox copy does not match source (source {source_sha256}, copy {copy_sha256})")]
    CopyMismatch {
        source_sha256: String,
        copy_sha256: String,
    },

    #[error("invalid campaign: {0}")]
    InvalidCampaign(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("domain error: {0}")]
    Domain(#[from] crate::domain::error::ClaimError),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
