use qfolio_types::Result;
use sha2::{Digest, Sha256};

/// Hash reference (hex-encoded SHA256)
pub type HashRef = String;

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> HashRef {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash of the canonical JSON form of `data`. Going through `Value` sorts
/// object keys, so field order and map insertion order do not matter.
pub fn compute_json_hash<T: serde::Serialize>(data: &T) -> Result<HashRef> {
    let value = serde_json::to_value(data)?;
    let json = serde_json::to_vec(&value)?;
    Ok(compute_hash(&json))
}

/// Keys holding wall-clock measurements, which differ between otherwise
/// identical runs
pub const TIMING_FIELDS: &[&str] = &["duration"];

/// Copy of `value` with the named object keys removed at any depth
pub fn without_fields(value: &serde_json::Value, fields: &[&str]) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !fields.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), without_fields(v, fields)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| without_fields(v, fields)).collect()),
        other => other.clone(),
    }
}
