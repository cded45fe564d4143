//! Canonical JSON encoding and content digests.
//!
//! Every place state crosses a trust boundary (events, bundles, digests)
//! goes through [`canonical_json`] first. Without it digests would not be
//! portable across platforms or serializer versions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A content digest plus the method that produced it.
///
/// Carried alongside exported bundles so a reader always knows how to
/// recompute and verify the digest, even if the method changes in a later
/// schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Hex-encoded SHA-256 digest of the run's canonical form.
    pub digest: String,
    /// Identifier for the digest method used, e.g. [`METHOD_ID`].
    pub method_id: String,
}

/// Errors from canonicalization.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// The value could not be serialized to JSON.
    #[error("failed to serialize value for canonicalization: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a canonical JSON byte string for `value`: object keys sorted
/// lexicographically at every level, no insignificant whitespace, numbers
/// formatted the way `serde_json` formats them (stable across platforms).
///
/// This is not a full JCS (RFC 8785) implementation, but it is sufficient
/// and stable for the value shapes this workspace ever hashes: JSON objects,
/// arrays, strings, and the bounded numeric ranges `serde_json` can
/// represent exactly.
///
/// # Errors
///
/// Returns [`DigestError::Json`] if `value` cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, DigestError> {
    let v = serde_json::to_value(value)?;
    let sorted = sort_keys(v);
    Ok(serde_json::to_vec(&sorted)?)
}

/// Recursively rewrite a [`serde_json::Value`] so every object is a
/// [`BTreeMap`], which `serde_json` always serializes in sorted key order.
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            serde_json::to_value(sorted).unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Identifier for the digest method used by [`digest_of`], embedded in
/// [`crate::model`]-adjacent `Provenance` records so a reader always knows
/// how to recompute a digest.
pub const METHOD_ID: &str = "sha256-canonical-json-v1";

/// Compute the content digest over an arbitrary canonicalizable value.
///
/// # Errors
///
/// Returns [`DigestError::Json`] if `value` cannot be serialized.
pub fn digest_of<T: Serialize>(value: &T) -> Result<String, DigestError> {
    let bytes = canonical_json(value)?;
    Ok(sha256_hex(&bytes))
}
