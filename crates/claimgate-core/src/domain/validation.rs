//! Semantic value checks layered over the typed records.
//!
//! The record types distinguish "unset" (`None`) from "set"; these helpers
//! decide whether a set value is actually usable: not blank, not a
//! placeholder token, and (for dates) a real ISO-8601 date.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use super::error::ValidationError;

/// Tokens that stand in for "not filled in yet". Matched case-insensitively
/// after trimming.
pub const PLACEHOLDER_TOKENS: &[&str] = &[
    "unknown",
    "pending",
    "placeholder",
    "tbd",
    "todo",
    "n/a",
    "none",
    "null",
    "xxx",
];

fn iso_date_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"))
}

/// Whether `value` is empty or whitespace only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Whether `value` is one of [`PLACEHOLDER_TOKENS`].
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    PLACEHOLDER_TOKENS.contains(&v.as_str())
}

/// Whether `value` is a calendar date `YYYY-MM-DD`.
pub fn is_iso_date(value: &str) -> bool {
    let v = value.trim();
    iso_date_shape().is_match(v) && NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
}

/// Like [`is_iso_date`] but also accepts a full RFC 3339 timestamp.
pub fn is_iso_date_or_timestamp(value: &str) -> bool {
    is_iso_date(value) || DateTime::parse_from_rfc3339(value.trim()).is_ok()
}

/// Outcome of checking a single optional text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Missing,
    Placeholder,
    Present,
}

/// Classify an optional text field. Blank strings count as missing.
pub fn field_state(value: Option<&str>) -> FieldState {
    match value {
        None => FieldState::Missing,
        Some(v) if is_blank(v) => FieldState::Missing,
        Some(v) if is_placeholder(v) => FieldState::Placeholder,
        Some(_) => FieldState::Present,
    }
}

/// Require a usable text value for `field`.
pub fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if is_blank(value) {
        return Err(ValidationError::BlankField {
            field: field.to_string(),
        });
    }
    if is_placeholder(value) {
        return Err(ValidationError::PlaceholderValue {
            field: field.to_string(),
            value: value.trim().to_string(),
        });
    }
    Ok(())
}

/// Require a usable ISO-8601 date for `field`.
pub fn require_date(field: &str, value: &str, allow_timestamp: bool) -> Result<(), ValidationError> {
    require_text(field, value)?;
    let ok = if allow_timestamp {
        is_iso_date_or_timestamp(value)
    } else {
        is_iso_date(value)
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidDate {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Require a finite metric value.
pub fn require_metric(name: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonNumericMetric {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_tokens_match_case_insensitively() {
        assert!(is_placeholder("Unknown"));
        assert!(is_placeholder("  TBD "));
        assert!(is_placeholder("pending"));
        assert!(!is_placeholder("arxiv:2401.00001"));
    }

    #[test]
    fn iso_dates() {
        assert!(is_iso_date("2025-02-28"));
        assert!(!is_iso_date("2025-02-30"));
        assert!(!is_iso_date("2025-2-3"));
        assert!(!is_iso_date("Feb 3 2025"));
        assert!(is_iso_date_or_timestamp("2025-02-03T10:00:00Z"));
        assert!(!is_iso_date("2025-02-03T10:00:00Z"));
    }

    #[test]
    fn field_state_classification() {
        assert_eq!(field_state(None), FieldState::Missing);
        assert_eq!(field_state(Some("   ")), FieldState::Missing);
        assert_eq!(field_state(Some("tbd")), FieldState::Placeholder);
        assert_eq!(field_state(Some("paper v2")), FieldState::Present);
    }

    #[test]
    fn require_date_reports_field() {
        let err = require_date("source_date", "last week", false).unwrap_err();
        assert!(err.to_string().contains("source_date"));
        assert!(require_date("source_date", "unknown", false)
            .unwrap_err()
            .to_string()
            .contains("placeholder"));
    }
}
