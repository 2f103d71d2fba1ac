//! Revision fingerprints.
//!
//! A revision is a SHA-256 digest of the record content in a canonical
//! encoding: JSON with object keys sorted recursively, so two records
//! with identical content always fingerprint identically regardless of
//! key order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Computes the revision fingerprint of a record, hex-encoded.
pub fn fingerprint(record: &Value) -> String {
    let canonical = canonicalize(record);
    // Serializing a Value cannot fail: keys are strings by construction.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Rewrites a value so that all object keys are in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
