//! Identifier normalization between canonical and wire encodings.
//!
//! The remote document store assigns 24-hex-character identifiers and
//! exchanges them in extended JSON form (`{"$oid": "..."}`). Inside the
//! authoring process every id is the plain canonical string. The helpers
//! here convert JSON trees between the two encodings and decide which
//! keys carry identifiers at all.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Length of a canonical id in hex characters.
pub const CANONICAL_ID_LEN: usize = 24;

/// Key used by the wire encoding to wrap a canonical id.
pub const WIRE_ID_KEY: &str = "$oid";

/// Returns `true` if `id` is exactly 24 hex characters.
pub fn is_canonical(id: &str) -> bool {
    id.len() == CANONICAL_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Returns `true` for keys that carry identifiers: `id`, `_id`, and any
/// key ending in `Id` or `Ids`.
pub fn is_id_key(key: &str) -> bool {
    key == "id" || key == "_id" || key.ends_with("Id") || key.ends_with("Ids")
}

/// Returns `true` for keys that carry a list of identifiers.
pub fn is_id_list_key(key: &str) -> bool {
    key.ends_with("Ids")
}

/// Unwrap a value into a plain id string.
///
/// Canonical strings and wire-encoded objects yield their inner string.
/// Populated references (`{"_id": ..., "name": ...}`) yield their own id.
/// Other scalars are converted to their string form, which callers then
/// validate with [`is_canonical`]. Never fails; arrays and `null` yield
/// `None`.
pub fn extract_canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => match map.get(WIRE_ID_KEY) {
            Some(inner) => extract_canonical_id(inner),
            None => map
                .get("_id")
                .or_else(|| map.get("id"))
                .and_then(extract_canonical_id),
        },
    }
}

/// Wrap an id string for the wire. Non-canonical strings stay plain so
/// they are never mistaken for remote ids.
pub fn wrap_id(id: &str) -> Value {
    if is_canonical(id) {
        let mut map = Map::with_capacity(1);
        map.insert(WIRE_ID_KEY.to_string(), Value::String(id.to_string()));
        Value::Object(map)
    } else {
        Value::String(id.to_string())
    }
}

/// If `map` is a wire-encoded id (`{"$oid": "<string>"}`), return the
/// inner string.
fn wire_id(map: &Map<String, Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get(WIRE_ID_KEY)?.as_str()
}

/// Recursively replace wire-encoded ids under id-named keys with their
/// plain string form. Everything else is walked unchanged.
pub fn normalize_tree(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_tree).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    let v = if is_id_key(&key) {
                        unwrap_id_value(v)
                    } else {
                        normalize_tree(v)
                    };
                    (key, v)
                })
                .collect(),
        ),
        other => other,
    }
}

fn unwrap_id_value(value: Value) -> Value {
    match value {
        Value::Object(map) => match wire_id(&map) {
            Some(id) => Value::String(id.to_string()),
            None => normalize_tree(Value::Object(map)),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_id_value).collect()),
        other => other,
    }
}

/// Structural inverse of [`normalize_tree`]: canonical strings under
/// id-named keys are wrapped into the wire encoding. Non-canonical
/// strings pass through untouched.
pub fn to_wire_tree(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(to_wire_tree).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    let v = if is_id_key(&key) {
                        wrap_id_value(v)
                    } else {
                        to_wire_tree(v)
                    };
                    (key, v)
                })
                .collect(),
        ),
        other => other,
    }
}

fn wrap_id_value(value: Value) -> Value {
    match value {
        Value::String(s) => wrap_id(&s),
        Value::Array(items) => Value::Array(items.into_iter().map(wrap_id_value).collect()),
        other => to_wire_tree(other),
    }
}

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// A validated canonical identifier assigned by the remote store.
///
/// Serializes as a plain string. Deserializes from either a plain
/// canonical string or a wire-encoded `{"$oid": ...}` object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate and wrap a canonical id string.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if is_canonical(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CoreError::InvalidId(raw.to_string()))
        }
    }

    /// Extract and validate an id from any JSON shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        extract_canonical_id(value).and_then(|id| Self::parse(&id).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The wire encoding of this id.
    pub fn to_wire(&self) -> Value {
        wrap_id(&self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let raw = extract_canonical_id(&value)
            .ok_or_else(|| D::Error::custom(format!("expected an id, found {value}")))?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}
