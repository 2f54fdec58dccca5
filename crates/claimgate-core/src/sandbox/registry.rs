//! Disposable registry copies.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use super::error::{SandboxError, SandboxResult};
use crate::domain::digest::sha256_hex;
use crate::metrics::METRICS;

/// sha256 of a file's bytes, hex encoded.
pub fn file_sha256(path: &Path) -> SandboxResult<String> {
    Ok(sha256_hex(&fs::read(path)?))
}

/// Before/after hashes of the source registry around a sandbox run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCheck {
    pub source_sha256_before: String,
    pub source_sha256_after: String,
    pub source_untouched: bool,
}

/// A byte-for-byte copy of a registry file in its own temp directory.
///
/// The source is only ever read. The copy and its directory are removed
/// when the sandbox is dropped.
pub struct RegistrySandbox {
    _dir: TempDir,
    source: PathBuf,
    path: PathBuf,
    source_sha256_before: String,
}

impl RegistrySandbox {
    /// Copy `source` into a fresh sandbox. The source must exist.
    pub fn create(source: &Path) -> SandboxResult<Self> {
        if !source.is_file() {
            return Err(SandboxError::SourceMissing(source.to_path_buf()));
        }
        let bytes = fs::read(source)?;
        let source_sha256_before = sha256_hex(&bytes);

        let dir = tempfile::Builder::new()
            .prefix("claimgate-sandbox-")
            .tempdir()?;
        let path = dir.path().join("registry.json");
        fs::write(&path, &bytes)?;

        let copy_sha256 = file_sha256(&path)?;
        if copy_sha256 != source_sha256_before {
            return Err(SandboxError::CopyMismatch {
                source_sha256: source_sha256_before,
                copy_sha256,
            });
        }

        METRICS.inc_sandbox_runs();
        tracing::debug!(
            source = %source.display(),
            sandbox = %path.display(),
            "registry sandbox created"
        );
        Ok(Self {
            _dir: dir,
            source: source.to_path_buf(),
            path,
            source_sha256_before,
        })
    }

    /// Path of the sandbox copy. All mutation goes here.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn source_sha256_before(&self) -> &str {
        &self.source_sha256_before
    }

    /// Re-hash the source and compare with the hash taken at creation.
    pub fn verify_source_untouched(&self) -> SandboxResult<SourceCheck> {
        let after = file_sha256(&self.source)?;
        Ok(SourceCheck {
            source_untouched: after == self.source_sha256_before,
            source_sha256_before: self.source_sha256_before.clone(),
            source_sha256_after: after,
        })
    }
}
