//! Per-run document store.
//!
//! Staging stages pass file paths to each other. The store reads each file
//! once, keeps the parsed JSON keyed by path and hands out typed views. It
//! lives for one run only; nothing is persisted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::error::{ClaimError, Result};

#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: HashMap<PathBuf, Value>,
    hits: u64,
    misses: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, path: &Path) -> Result<&Value> {
        if self.docs.contains_key(path) {
            self.hits += 1;
        } else {
            self.misses += 1;
            let bytes = std::fs::read(path)
                .map_err(|e| ClaimError::input(path.display(), format!("cannot read: {e}")))?;
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| ClaimError::input(path.display(), format!("malformed JSON: {e}")))?;
            self.docs.insert(path.to_path_buf(), value);
        }
        self.docs
            .get(path)
            .ok_or_else(|| ClaimError::input(path.display(), "document vanished from store"))
    }

    /// Typed view of `path`. Shape errors name the file.
    pub fn load<T: DeserializeOwned>(&mut self, path: &Path) -> Result<T> {
        let value = self.entry(path)?.clone();
        serde_json::from_value(value).map_err(|e| ClaimError::input(path.display(), e.to_string()))
    }

    /// Forget `path`, e.g. after a stage rewrote it.
    pub fn invalidate(&mut self, path: &Path) {
        self.docs.remove(path);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
