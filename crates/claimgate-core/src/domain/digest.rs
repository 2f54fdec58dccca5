//! Canonical JSON and SHA-256 digests.
//!
//! Two kinds of hashes flow through the pipeline:
//! - byte hashes of files on disk ([`sha256_hex`]), used as confirmation
//!   hashes and for sandbox non-interference checks;
//! - canonical-JSON digests ([`compute_digest`]), used for baseline
//!   `artifact_hash` values and campaign identity. Object keys are sorted by
//!   UTF-16 code units and integer-valued floats collapse to integers, so
//!   semantically equal documents hash equally regardless of key order.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::error::{ClaimError, Result};

/// Hex-encoded SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn sort_keys_utf16(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys_utf16(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys_utf16).collect()),
        other => other.clone(),
    }
}

fn normalize_numbers(value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize_numbers(v)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => Ok(Value::Array(
            items.iter().map(normalize_numbers).collect::<Result<Vec<_>>>()?,
        )),
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(ClaimError::input(
                    "canonical json",
                    "NaN/Infinity not permitted",
                ));
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Number(serde_json::Number::from(f as i64)))
            } else {
                Ok(Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Convert a JSON value to canonical form: normalize numbers, sort keys, compact.
pub fn canonical_json(value: &Value) -> Result<String> {
    let normalized = normalize_numbers(value)?;
    Ok(serde_json::to_string(&sort_keys_utf16(&normalized))?)
}

/// SHA-256 hex digest of the canonical JSON form of `value`.
pub fn compute_digest(value: &Value) -> Result<String> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Digest of any serializable value via its canonical JSON form.
pub fn digest_of<T: serde::Serialize>(value: &T) -> Result<String> {
    compute_digest(&serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_of_empty_input_is_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_json_is_key_order_invariant() {
        let a = json!({"metrics": {"quality": 0.5, "aggregate_delta": 0.1}, "baseline_id": "x"});
        let b = json!({"baseline_id": "x", "metrics": {"aggregate_delta": 0.1, "quality": 0.5}});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn integer_valued_floats_collapse() {
        let input = json!({ "value": 2.0, "other": 1.5 });
        assert_eq!(
            canonical_json(&input).unwrap(),
            r#"{"other":1.5,"value":2}"#
        );
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!({"paths": ["a", "b"]});
        let b = json!({"paths": ["b", "a"]});
        assert_ne!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn digest_is_64_hex_chars() {
        let digest = compute_digest(&json!({"registry_version": "1"})).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
