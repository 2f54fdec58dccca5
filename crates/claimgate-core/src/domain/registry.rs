//! The baseline registry: the sole persisted aggregate.
//!
//! Every write is a full-file rewrite done as write-to-temp + rename in the
//! target directory, so a reader never observes a half-written registry.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::baseline::BaselineRecord;
use super::error::{ClaimError, Result};

/// Version stamped on registries created from scratch.
pub const REGISTRY_VERSION: &str = "1";

/// Whether an upsert created or replaced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// `{registry_version, baselines}` as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub registry_version: String,
    #[serde(default)]
    pub baselines: Vec<BaselineRecord>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            registry_version: REGISTRY_VERSION.to_string(),
            baselines: Vec::new(),
        }
    }

    /// Parse registry bytes, enforcing `baseline_id` uniqueness.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let registry: Registry = serde_json::from_slice(bytes)?;
        registry.ensure_unique()?;
        for record in &registry.baselines {
            if let Some((name, _)) = record.metrics.iter().find(|(_, v)| !v.is_finite()) {
                return Err(ClaimError::input(
                    &record.baseline_id,
                    format!("metric {name} is not a finite number"),
                ));
            }
        }
        Ok(registry)
    }

    /// Load for reading. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        Self::load_existing(path)
    }

    /// Load a registry that must already exist on disk.
    pub fn load_existing(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClaimError::RegistryMissing(path.to_path_buf())
            } else {
                ClaimError::Io(e)
            }
        })?;
        Self::from_slice(&bytes)
            .map_err(|e| ClaimError::input(path.display(), e.to_string()))
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Rewrite the whole file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.ensure_unique()?;
        write_atomic(path, &self.to_bytes()?)
    }

    pub fn ensure_unique(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for record in &self.baselines {
            if !seen.insert(record.baseline_id.as_str()) {
                return Err(ClaimError::DuplicateBaseline(record.baseline_id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, baseline_id: &str) -> Option<&BaselineRecord> {
        self.baselines.iter().find(|b| b.baseline_id == baseline_id)
    }

    pub fn get_mut(&mut self, baseline_id: &str) -> Option<&mut BaselineRecord> {
        self.baselines.iter_mut().find(|b| b.baseline_id == baseline_id)
    }

    /// Insert-or-update keyed by `baseline_id`. Updates keep the record's position.
    pub fn upsert(&mut self, record: BaselineRecord) -> UpsertOutcome {
        match self.get_mut(&record.baseline_id) {
            Some(existing) => {
                *existing = record;
                UpsertOutcome::Updated
            }
            None => {
                self.baselines.push(record);
                UpsertOutcome::Inserted
            }
        }
    }
}

/// Replace `path` with `data` atomically (temp file in the same directory, then rename).
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ClaimError::Io(e.error))?;
    Ok(())
}
