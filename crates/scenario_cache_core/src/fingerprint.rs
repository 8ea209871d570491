use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Result, ScenarioError};

pub const FINGERPRINT_LEN: usize = 24;

/// Short scenario identity used as the cache key and artifact namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintMode {
    /// Hash the request body exactly as received.
    #[default]
    Raw,
    /// Hash a sorted-key, whitespace-free re-serialization of the body.
    Canonical,
}

impl FingerprintMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "canonical" => Some(Self::Canonical),
            _ => None,
        }
    }
}

/// First 24 hex characters of the SHA-256 digest of `bytes`.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{digest:x}");
    hex.truncate(FINGERPRINT_LEN);
    Fingerprint(hex)
}

/// Re-serializes a JSON body with object keys in sorted order and no
/// insignificant whitespace.
pub fn canonical_payload_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|error| ScenarioError::MalformedBody {
        message: error.to_string(),
    })?;
    serde_json::to_vec(&sort_keys(value)).map_err(|error| ScenarioError::Serialization {
        message: error.to_string(),
    })
}

// Rebuilt explicitly so the order holds even if `preserve_order` is enabled
// somewhere in the dependency graph.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

pub fn fingerprint_payload(bytes: &[u8], mode: FingerprintMode) -> Result<Fingerprint> {
    match mode {
        FingerprintMode::Raw => Ok(fingerprint_bytes(bytes)),
        FingerprintMode::Canonical => Ok(fingerprint_bytes(&canonical_payload_bytes(bytes)?)),
    }
}
