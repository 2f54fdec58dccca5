//! Typed baseline patches.
//!
//! A patch is a tree of optional fields. Each leaf is a [`FieldPatch`]:
//! an absent JSON key is `Keep`, a value is `Set`, and an explicit `null` is
//! `Unset`. Scaffold templates use `""` and `null` as fill-in placeholders,
//! which is what [`BaselinePatch::unresolved_fields`] looks for.
//!
//! Patches never carry `verified`, `replication_status` or `attestation`;
//! unknown keys are rejected at parse time.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::{ClaimError, Result};
use super::validation::is_blank;

/// One leaf of a patch.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldPatch<T> {
    #[default]
    Keep,
    Set(T),
    Unset,
}

impl<T> FieldPatch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldPatch::Keep)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldPatch::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldPatch<String> {
    /// A placeholder still waiting for a value: `null` or a blank string.
    pub fn is_unresolved(&self) -> bool {
        match self {
            FieldPatch::Keep => false,
            FieldPatch::Unset => true,
            FieldPatch::Set(v) => is_blank(v),
        }
    }

    /// A set, non-blank value.
    pub fn filled(&self) -> Option<&str> {
        match self {
            FieldPatch::Set(v) if !is_blank(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn placeholder() -> Self {
        FieldPatch::Set(String::new())
    }
}

impl<T: Serialize> Serialize for FieldPatch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldPatch::Set(v) => v.serialize(serializer),
            FieldPatch::Keep | FieldPatch::Unset => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldPatch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => FieldPatch::Set(v),
            None => FieldPatch::Unset,
        })
    }
}

/// Patch over the evidence sub-object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvidencePatch {
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub citation: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub artifact_hash: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub retrieval_date: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub verification_method: FieldPatch<String>,
}

impl EvidencePatch {
    pub fn is_empty(&self) -> bool {
        self.citation.is_keep()
            && self.artifact_hash.is_keep()
            && self.retrieval_date.is_keep()
            && self.verification_method.is_keep()
    }

    /// Mutable access by evidence field name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldPatch<String>> {
        match name {
            "citation" => Some(&mut self.citation),
            "artifact_hash" => Some(&mut self.artifact_hash),
            "retrieval_date" => Some(&mut self.retrieval_date),
            "verification_method" => Some(&mut self.verification_method),
            _ => None,
        }
    }
}

/// Patch over one baseline record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselinePatch {
    /// Optional guard: when present it must name the patched baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub label: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub source_type: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub source: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub source_date: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub enabled: FieldPatch<bool>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub suite_id: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub scoring_protocol: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "FieldPatch::is_keep")]
    pub notes: FieldPatch<String>,
    #[serde(default, skip_serializing_if = "EvidencePatch::is_empty")]
    pub evidence: EvidencePatch,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, FieldPatch<f64>>,
}

impl BaselinePatch {
    /// Number of text leaves addressed by [`Self::text_fields`].
    pub const TEXT_FIELD_COUNT: usize = 11;

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| ClaimError::input(path.display(), format!("cannot read patch: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClaimError::input(path.display(), format!("malformed patch: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        self.text_fields().iter().all(|(_, f)| f.is_keep())
            && self.enabled.is_keep()
            && self.metrics.is_empty()
    }

    /// Every text leaf with its dotted path.
    pub fn text_fields(&self) -> [(&'static str, &FieldPatch<String>); Self::TEXT_FIELD_COUNT] {
        [
            ("label", &self.label),
            ("source_type", &self.source_type),
            ("source", &self.source),
            ("source_date", &self.source_date),
            ("suite_id", &self.suite_id),
            ("scoring_protocol", &self.scoring_protocol),
            ("notes", &self.notes),
            ("evidence.citation", &self.evidence.citation),
            ("evidence.artifact_hash", &self.evidence.artifact_hash),
            ("evidence.retrieval_date", &self.evidence.retrieval_date),
            ("evidence.verification_method", &self.evidence.verification_method),
        ]
    }

    fn text_fields_mut(
        &mut self,
    ) -> [(&'static str, &mut FieldPatch<String>); Self::TEXT_FIELD_COUNT] {
        let BaselinePatch {
            label,
            source_type,
            source,
            source_date,
            suite_id,
            scoring_protocol,
            notes,
            evidence,
            ..
        } = self;
        let EvidencePatch {
            citation,
            artifact_hash,
            retrieval_date,
            verification_method,
        } = evidence;
        [
            ("label", label),
            ("source_type", source_type),
            ("source", source),
            ("source_date", source_date),
            ("suite_id", suite_id),
            ("scoring_protocol", scoring_protocol),
            ("notes", notes),
            ("evidence.citation", citation),
            ("evidence.artifact_hash", artifact_hash),
            ("evidence.retrieval_date", retrieval_date),
            ("evidence.verification_method", verification_method),
        ]
    }

    /// Dotted paths of every leaf this patch touches.
    pub fn touched_fields(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .text_fields()
            .iter()
            .filter(|(_, f)| !f.is_keep())
            .map(|(p, _)| p.to_string())
            .collect();
        if !self.enabled.is_keep() {
            out.push("enabled".to_string());
        }
        out.extend(self.metrics.keys().map(|k| format!("metrics.{k}")));
        out
    }

    /// Leaves still holding a placeholder (`""` or `null`).
    pub fn unresolved_fields(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .text_fields()
            .iter()
            .filter(|(_, f)| f.is_unresolved())
            .map(|(p, _)| p.to_string())
            .collect();
        if matches!(self.enabled, FieldPatch::Unset) {
            out.push("enabled".to_string());
        }
        out.extend(
            self.metrics
                .iter()
                .filter(|(_, v)| !matches!(v, FieldPatch::Set(_)))
                .map(|(k, _)| format!("metrics.{k}")),
        );
        out
    }

    /// Fill placeholders of this template from `defaults`. Only leaves the
    /// template already declares are filled; resolved leaves stay as they are.
    pub fn fill_from_defaults(&mut self, defaults: &BaselinePatch) {
        let sources = defaults.text_fields();
        for (i, (_, slot)) in self.text_fields_mut().into_iter().enumerate() {
            if slot.is_unresolved() {
                if let Some(v) = sources[i].1.filled() {
                    *slot = FieldPatch::Set(v.to_string());
                }
            }
        }
        if matches!(self.enabled, FieldPatch::Unset) {
            if let FieldPatch::Set(v) = defaults.enabled {
                self.enabled = FieldPatch::Set(v);
            }
        }
        for (name, slot) in self.metrics.iter_mut() {
            if !matches!(slot, FieldPatch::Set(_)) {
                if let Some(FieldPatch::Set(v)) = defaults.metrics.get(name) {
                    *slot = FieldPatch::Set(*v);
                }
            }
        }
    }

    /// Apply explicit values from `explicit`. Blank and `null` explicit values
    /// never override; explicit metrics may add new metric names.
    pub fn overlay(&mut self, explicit: &BaselinePatch) {
        let sources = explicit.text_fields();
        for (i, (_, slot)) in self.text_fields_mut().into_iter().enumerate() {
            if let Some(v) = sources[i].1.filled() {
                *slot = FieldPatch::Set(v.to_string());
            }
        }
        if let FieldPatch::Set(v) = explicit.enabled {
            self.enabled = FieldPatch::Set(v);
        }
        for (name, value) in &explicit.metrics {
            if let FieldPatch::Set(v) = value {
                self.metrics.insert(name.clone(), FieldPatch::Set(*v));
            }
        }
    }
}
