use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Copy of `v` with every object rebuilt in key order. Holds whether or not
/// serde_json keeps insertion order.
fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), sorted(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Serializes with object keys sorted at every level, so documents that differ
/// only in key order produce the same bytes.
pub fn canonical_json(v: &Value) -> String {
    serde_json::to_string(&sorted(v)).unwrap_or_default()
}

/// SHA-256 hex digest of the canonical form of `v`.
pub fn content_hash(v: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(v).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn hash_of<T: Serialize>(entity: &T) -> crate::error::Result<String> {
    let v = serde_json::to_value(entity)?;
    Ok(content_hash(&v))
}
