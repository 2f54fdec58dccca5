//! Shared fixtures for the claimgate integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use claimgate_core::domain::digest::sha256_hex;
use claimgate_core::{BaselineRecord, EvalReport, Registry, SourceType};
use serde_json::json;

pub const SUITE: &str = "suite-v1";
pub const SCORING: &str = "rubric-v1";

/// Eval report observing `quality` only.
pub fn eval(quality: f64) -> EvalReport {
    serde_json::from_value(json!({
        "benchmark_progress": {
            "suite_id": SUITE,
            "observed": {"quality": quality},
            "gaps": {"remaining_distance": 0},
            "ready": true
        },
        "benchmark_provenance": {"scoring_reference": SCORING}
    }))
    .unwrap()
}

/// External baseline with complete evidence, aligned to the harness, not yet attested.
pub fn clean_external(id: &str, quality: f64) -> BaselineRecord {
    let mut r = BaselineRecord::new(id, SourceType::ExternalReported);
    r.label = Some(format!("Vendor model {id}"));
    r.source = Some("Vendor technical report".to_string());
    r.source_date = Some("2025-03-01".to_string());
    r.suite_id = Some(SUITE.to_string());
    r.scoring_protocol = Some(SCORING.to_string());
    r.evidence.citation = Some("https://vendor.example/report.pdf".to_string());
    r.evidence.artifact_hash = Some("sha256:5f2a9c".to_string());
    r.evidence.retrieval_date = Some("2025-03-02".to_string());
    r.evidence.verification_method = Some("published results table".to_string());
    r.metrics.insert("quality".to_string(), quality);
    r
}

pub fn write_registry(dir: &Path, records: Vec<BaselineRecord>) -> PathBuf {
    let path = dir.join("registry.json");
    let mut registry = Registry::empty();
    for r in records {
        registry.upsert(r);
    }
    registry.save(&path).unwrap();
    path
}

pub fn write_json(path: &Path, value: serde_json::Value) -> PathBuf {
    std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    path.to_path_buf()
}

pub fn file_hash(path: &Path) -> String {
    sha256_hex(&std::fs::read(path).unwrap())
}
