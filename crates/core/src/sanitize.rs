//! Stale-identifier removal.
//!
//! Ids in a cached draft may be client-side placeholders (temporary keys,
//! timestamps) that were never assigned by the remote store. [`sanitize`]
//! normalizes a JSON tree and enforces the binary rule for every id-named
//! field: either `null`, or a canonical 24-hex string. Anything else is
//! removed. The transform is pure and idempotent.

use serde_json::{Map, Value};

use crate::ids::{extract_canonical_id, is_canonical, is_id_key, is_id_list_key};

/// Result of a [`sanitize`] pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    /// The cleaned tree.
    pub value: Value,
    /// JSON paths (e.g. `$.modules[0].id`) of ids that were dropped.
    pub dropped: Vec<String>,
}

impl Sanitized {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Normalize wire ids and drop every non-canonical id in `value`.
///
/// - Wire-encoded ids and populated references collapse to their plain
///   canonical string.
/// - Id fields holding anything else are deleted.
/// - Id lists (`*Ids`) keep only their canonical entries.
pub fn sanitize(value: Value) -> Sanitized {
    let mut dropped = Vec::new();
    let value = walk(value, "$", &mut dropped);
    Sanitized { value, dropped }
}

fn walk(value: Value, path: &str, dropped: &mut Vec<String>) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| walk(item, &format!("{path}[{i}]"), dropped))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                let child = format!("{path}.{key}");
                if is_id_key(&key) {
                    if let Some(v) = clean_id_field(&key, v, &child, dropped) {
                        out.insert(key, v);
                    }
                } else {
                    out.insert(key, walk(v, &child, dropped));
                }
            }
            Value::Object(out)
        }
        other => other,
    }
}

fn clean_id_field(
    key: &str,
    value: Value,
    path: &str,
    dropped: &mut Vec<String>,
) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Array(items) if is_id_list_key(key) => {
            let mut kept = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match canonical(item) {
                    Some(id) => kept.push(Value::String(id)),
                    None => dropped.push(format!("{path}[{i}]")),
                }
            }
            Some(Value::Array(kept))
        }
        other => match canonical(&other) {
            Some(id) => Some(Value::String(id)),
            None => {
                dropped.push(path.to_string());
                None
            }
        },
    }
}

fn canonical(value: &Value) -> Option<String> {
    extract_canonical_id(value).filter(|id| is_canonical(id))
}
