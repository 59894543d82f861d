//! Opaque task and log records.
//!
//! A record is whatever field mapping the caller hands over. The store only
//! ever looks at the `id` field, and only after coercing it to `i64`.

use serde_json::{Map, Value};

/// A caller-owned field mapping. Field order is preserved.
pub type Record = Map<String, Value>;

/// Field the store reads and assigns on task records.
pub const ID_FIELD: &str = "id";

/// Normalize any JSON number to a 64-bit integer.
///
/// Unsigned values above `i64::MAX` wrap, floats truncate toward zero
/// (saturating, NaN becomes 0). Non-numbers yield `None`.
pub fn coerce_id(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        Some(i)
    } else if let Some(u) = n.as_u64() {
        Some(u as i64)
    } else {
        n.as_f64().map(|f| f as i64)
    }
}

/// Coerced `id` of `record`, if it has a numeric one.
pub fn record_id(record: &Record) -> Option<i64> {
    record.get(ID_FIELD).and_then(coerce_id)
}

/// Whether `record` carries an `id` that is neither absent nor `null`.
pub fn has_id(record: &Record) -> bool {
    !matches!(record.get(ID_FIELD), None | Some(Value::Null))
}
