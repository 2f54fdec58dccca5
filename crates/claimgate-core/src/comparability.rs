//! Baseline comparability engine.
//!
//! [`compare`] decides, for every baseline in a registry, whether it is
//! comparable with an evaluation report and scores each overlapping metric as
//! a win, loss or tie. It is a pure function of its inputs: no registry
//! mutation, no caching.
//!
//! A baseline is comparable iff all of these hold:
//! - it is enabled and verified;
//! - its evidence is valid: the four evidence fields are present and not
//!   placeholders, dates are ISO-8601, and a verified external baseline has
//!   been replicated in the internal harness;
//! - `suite_id` and `scoring_protocol` exactly match the report;
//! - at least one metric name is shared with the report's observed metrics.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::baseline::{BaselineRecord, Evidence, ReplicationStatus, SourceType};
use crate::domain::eval::EvalReport;
use crate::domain::registry::Registry;
use crate::domain::validation::{field_state, is_iso_date, is_iso_date_or_timestamp, FieldState};
use crate::report::COMPARISON_DISCLAIMER;

/// Advantages closer to zero than this are ties.
pub const TIE_EPSILON: f64 = 1e-9;

/// Metrics where a lower value wins. Everything else is higher-is-better.
const LOWER_IS_BETTER: &[&str] = &["public_overclaim_rate"];

/// Metrics known to be higher-is-better.
pub const HIGHER_IS_BETTER: &[&str] = &[
    "quality",
    "aggregate_delta",
    "holdout_quality",
    "adversarial_quality",
];

/// Direction of a metric.
pub fn higher_is_better(metric: &str) -> bool {
    !LOWER_IS_BETTER.contains(&metric)
}

const UNSET: &str = "<unset>";

// ---------------------------------------------------------------------------
// Reasons
// ---------------------------------------------------------------------------

/// Why a baseline is not comparable. Serialized as a human-readable string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Disabled,
    Unverified,
    MissingEvidence(String),
    PlaceholderEvidence(String),
    InvalidDate(String),
    NotReplicated,
    SuiteMismatch { baseline: String, report: String },
    ScoringMismatch { baseline: String, report: String },
    NoMetrics,
    NoOverlap,
}

impl Reason {
    /// Reasons that make the evidence invalid.
    pub fn is_evidence(&self) -> bool {
        matches!(
            self,
            Reason::MissingEvidence(_)
                | Reason::PlaceholderEvidence(_)
                | Reason::InvalidDate(_)
                | Reason::NotReplicated
        )
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Disabled => f.write_str("baseline disabled"),
            Reason::Unverified => f.write_str("baseline unverified"),
            Reason::MissingEvidence(field) => write!(f, "missing evidence field: {field}"),
            Reason::PlaceholderEvidence(field) => write!(f, "placeholder evidence field: {field}"),
            Reason::InvalidDate(field) => write!(f, "invalid date: {field}"),
            Reason::NotReplicated => {
                f.write_str("external baseline not replicated in internal harness")
            }
            Reason::SuiteMismatch { baseline, report } => {
                write!(f, "suite_id mismatch (baseline '{baseline}' vs report '{report}')")
            }
            Reason::ScoringMismatch { baseline, report } => write!(
                f,
                "scoring_protocol mismatch (baseline '{baseline}' vs report '{report}')"
            ),
            Reason::NoMetrics => f.write_str("no baseline metrics declared"),
            Reason::NoOverlap => f.write_str("no overlapping metrics with evaluation report"),
        }
    }
}

fn parse_mismatch(rest: &str) -> Option<(String, String)> {
    let inner = rest.strip_prefix("(baseline '")?.strip_suffix("')")?;
    let (baseline, report) = inner.split_once("' vs report '")?;
    Some((baseline.to_string(), report.to_string()))
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reason = match s {
            "baseline disabled" => Reason::Disabled,
            "baseline unverified" => Reason::Unverified,
            "external baseline not replicated in internal harness" => Reason::NotReplicated,
            "no baseline metrics declared" => Reason::NoMetrics,
            "no overlapping metrics with evaluation report" => Reason::NoOverlap,
            _ => {
                if let Some(f) = s.strip_prefix("missing evidence field: ") {
                    Reason::MissingEvidence(f.to_string())
                } else if let Some(f) = s.strip_prefix("placeholder evidence field: ") {
                    Reason::PlaceholderEvidence(f.to_string())
                } else if let Some(f) = s.strip_prefix("invalid date: ") {
                    Reason::InvalidDate(f.to_string())
                } else if let Some((baseline, report)) =
                    s.strip_prefix("suite_id mismatch ").and_then(parse_mismatch)
                {
                    Reason::SuiteMismatch { baseline, report }
                } else if let Some((baseline, report)) = s
                    .strip_prefix("scoring_protocol mismatch ")
                    .and_then(parse_mismatch)
                {
                    Reason::ScoringMismatch { baseline, report }
                } else {
                    return Err(format!("unknown comparability reason: {s}"));
                }
            }
        };
        Ok(reason)
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparability {
    pub comparable: bool,
    pub reasons: Vec<Reason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub evidence_valid: bool,
    pub missing_fields: Vec<String>,
    pub replication_status: ReplicationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub ours: f64,
    pub baseline: f64,
    /// `ours - baseline`, negated for lower-is-better metrics.
    pub advantage: f64,
    pub outcome: Outcome,
    pub higher_is_better: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub baseline_id: String,
    pub label: Option<String>,
    pub source_type: SourceType,
    pub comparability: Comparability,
    pub verification: VerificationSummary,
    pub metric_comparison: BTreeMap<String, MetricComparison>,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub mean_advantage: Option<f64>,
}

impl ComparisonRow {
    pub fn is_comparable(&self) -> bool {
        self.comparability.comparable
    }

    pub fn is_external(&self) -> bool {
        self.source_type.is_external()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_baselines: u32,
    pub enabled_baselines: u32,
    pub comparable_baselines: u32,
    pub comparable_external_baselines: u32,
    pub comparable_internal_baselines: u32,
    pub best_mean_advantage: Option<f64>,
    pub best_baseline_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Ok,
    NoBaselinesConfigured,
    Error,
}

/// Output of [`compare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub status: ComparisonStatus,
    pub disclaimer: String,
    pub suite_id: String,
    pub scoring_protocol: String,
    pub rows: Vec<ComparisonRow>,
    pub summary: ComparisonSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ComparisonReport {
    fn empty(eval: &EvalReport, status: ComparisonStatus, reason: Option<String>) -> Self {
        Self {
            status,
            disclaimer: COMPARISON_DISCLAIMER.to_string(),
            suite_id: eval.suite_id().to_string(),
            scoring_protocol: eval.scoring_reference().to_string(),
            rows: Vec::new(),
            summary: ComparisonSummary::default(),
            reason,
        }
    }

    pub fn row(&self, baseline_id: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.baseline_id == baseline_id)
    }

    pub fn external_rows(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| r.is_external())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evidence and date reasons for a record, independent of the report.
pub fn evidence_reasons(record: &BaselineRecord) -> Vec<Reason> {
    let mut reasons = Vec::new();
    for field in Evidence::REQUIRED_FIELDS {
        match field_state(record.evidence.field(field)) {
            FieldState::Missing => reasons.push(Reason::MissingEvidence(field.to_string())),
            FieldState::Placeholder => {
                reasons.push(Reason::PlaceholderEvidence(field.to_string()))
            }
            FieldState::Present => {}
        }
    }

    if let Some(date) = record.evidence.retrieval_date.as_deref() {
        if field_state(Some(date)) == FieldState::Present && !is_iso_date_or_timestamp(date) {
            reasons.push(Reason::InvalidDate("evidence.retrieval_date".to_string()));
        }
    }
    let source_date_ok = record
        .source_date
        .as_deref()
        .map(is_iso_date)
        .unwrap_or(false);
    if !source_date_ok {
        reasons.push(Reason::InvalidDate("source_date".to_string()));
    }

    if record.is_over_claimed() {
        reasons.push(Reason::NotReplicated);
    }
    reasons
}

fn score_metric(metric: &str, ours: f64, baseline: f64) -> MetricComparison {
    let hib = higher_is_better(metric);
    let raw = ours - baseline;
    let advantage = if hib { raw } else { -raw };
    let outcome = if advantage.abs() <= TIE_EPSILON {
        Outcome::Tie
    } else if advantage > 0.0 {
        Outcome::Win
    } else {
        Outcome::Loss
    };
    MetricComparison {
        ours,
        baseline,
        advantage,
        outcome,
        higher_is_better: hib,
    }
}

/// Assess a single baseline against a report.
pub fn assess_baseline(eval: &EvalReport, record: &BaselineRecord) -> ComparisonRow {
    let mut reasons = Vec::new();
    if !record.enabled {
        reasons.push(Reason::Disabled);
    }
    if !record.verified {
        reasons.push(Reason::Unverified);
    }

    let evidence = evidence_reasons(record);
    let evidence_valid = evidence.is_empty();
    let missing_fields = evidence
        .iter()
        .filter_map(|r| match r {
            Reason::MissingEvidence(f) | Reason::PlaceholderEvidence(f) => Some(f.clone()),
            _ => None,
        })
        .collect();
    reasons.extend(evidence);

    if record.suite_id.as_deref() != Some(eval.suite_id()) {
        reasons.push(Reason::SuiteMismatch {
            baseline: record.suite_id.clone().unwrap_or_else(|| UNSET.to_string()),
            report: eval.suite_id().to_string(),
        });
    }
    if record.scoring_protocol.as_deref() != Some(eval.scoring_reference()) {
        reasons.push(Reason::ScoringMismatch {
            baseline: record
                .scoring_protocol
                .clone()
                .unwrap_or_else(|| UNSET.to_string()),
            report: eval.scoring_reference().to_string(),
        });
    }

    let mut metric_comparison = BTreeMap::new();
    for (name, theirs) in &record.metrics {
        if let Some(ours) = eval.observed().get(name) {
            metric_comparison.insert(name.clone(), score_metric(name, *ours, *theirs));
        }
    }
    if record.metrics.is_empty() {
        reasons.push(Reason::NoMetrics);
    } else if metric_comparison.is_empty() {
        reasons.push(Reason::NoOverlap);
    }

    let mut wins = 0;
    let mut losses = 0;
    let mut ties = 0;
    for m in metric_comparison.values() {
        match m.outcome {
            Outcome::Win => wins += 1,
            Outcome::Loss => losses += 1,
            Outcome::Tie => ties += 1,
        }
    }
    let mean_advantage = if metric_comparison.is_empty() {
        None
    } else {
        let total: f64 = metric_comparison.values().map(|m| m.advantage).sum();
        Some(total / metric_comparison.len() as f64)
    };

    ComparisonRow {
        baseline_id: record.baseline_id.clone(),
        label: record.label.clone(),
        source_type: record.source_type,
        comparability: Comparability {
            comparable: reasons.is_empty(),
            reasons,
        },
        verification: VerificationSummary {
            evidence_valid,
            missing_fields,
            replication_status: record.evidence.replication_status,
        },
        metric_comparison,
        wins,
        losses,
        ties,
        mean_advantage,
    }
}

/// Compare every baseline in `registry` against `eval`.
pub fn compare(eval: &EvalReport, registry: &Registry) -> ComparisonReport {
    if registry.baselines.is_empty() {
        return ComparisonReport::empty(eval, ComparisonStatus::NoBaselinesConfigured, None);
    }

    let rows: Vec<ComparisonRow> = registry
        .baselines
        .iter()
        .map(|b| assess_baseline(eval, b))
        .collect();

    let mut summary = ComparisonSummary {
        total_baselines: rows.len() as u32,
        ..ComparisonSummary::default()
    };
    for (row, record) in rows.iter().zip(&registry.baselines) {
        if record.enabled {
            summary.enabled_baselines += 1;
        }
        if !row.is_comparable() {
            continue;
        }
        summary.comparable_baselines += 1;
        if row.is_external() {
            summary.comparable_external_baselines += 1;
        } else {
            summary.comparable_internal_baselines += 1;
        }
        if let Some(mean) = row.mean_advantage {
            if summary.best_mean_advantage.map_or(true, |best| mean > best) {
                summary.best_mean_advantage = Some(mean);
                summary.best_baseline_id = Some(row.baseline_id.clone());
            }
        }
    }

    crate::metrics::METRICS.inc_comparisons();
    crate::obs::emit_comparison_computed(
        eval.suite_id(),
        summary.total_baselines,
        summary.comparable_baselines,
    );

    ComparisonReport {
        status: ComparisonStatus::Ok,
        disclaimer: COMPARISON_DISCLAIMER.to_string(),
        suite_id: eval.suite_id().to_string(),
        scoring_protocol: eval.scoring_reference().to_string(),
        rows,
        summary,
        reason: None,
    }
}

/// Compare against the registry file at `path`.
///
/// A missing file reports `no_baselines_configured`; an unreadable or
/// malformed file reports `error` with the reason.
pub fn compare_path(eval: &EvalReport, path: &Path) -> ComparisonReport {
    if !path.exists() {
        return ComparisonReport::empty(eval, ComparisonStatus::NoBaselinesConfigured, None);
    }
    match Registry::load_existing(path) {
        Ok(registry) => compare(eval, &registry),
        Err(e) => ComparisonReport::empty(eval, ComparisonStatus::Error, Some(e.to_string())),
    }
}
