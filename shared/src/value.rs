//! The document tree stored in snapshots.
//!
//! Descriptors and command arguments are arbitrary nested documents. Capture
//! replaces every live object inside them with a [`Value::Ref`], so a `Value`
//! never holds anything that only makes sense in the capturing process.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::id::ResourceId;

/// Key of the single-key object that encodes [`Value::Ref`].
pub const REF_KEY: &str = "$ref";

/// Key of the single-key object that encodes [`Value::Bytes`].
pub const BYTES_KEY: &str = "$bytes";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Ref(ResourceId),
}

/// A JSON document that does not decode into a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("`{REF_KEY}` must hold an unsigned integer id")]
    InvalidRef,
    #[error("`{BYTES_KEY}` must hold an array of integers in 0..=255")]
    InvalidBytes,
}

impl Value {
    /// Builds an object node from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<ResourceId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Looks up a key of an object node. Non-objects have no keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Calls `f` for every reference in the tree, depth first.
    pub fn for_each_ref(&self, f: &mut impl FnMut(ResourceId)) {
        match self {
            Value::Ref(id) => f(*id),
            Value::Array(items) => items.iter().for_each(|item| item.for_each_ref(f)),
            Value::Object(map) => map.values().for_each(|item| item.for_each_ref(f)),
            _ => {}
        }
    }

    /// All references in the tree, depth first, duplicates kept.
    pub fn refs(&self) -> Vec<ResourceId> {
        let mut out = Vec::new();
        self.for_each_ref(&mut |id| out.push(id));
        out
    }

    /// Plain JSON form of this value, with `$ref` / `$bytes` wrappers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => wrapper(
                BYTES_KEY,
                serde_json::Value::Array(bytes.iter().map(|b| (*b).into()).collect()),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Ref(id) => wrapper(REF_KEY, id.get().into()),
        }
    }
}

fn wrapper(key: &str, inner: serde_json::Value) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(key.to_owned(), inner);
    serde_json::Value::Object(map)
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(mut map) => {
                if map.len() == 1 {
                    if let Some(raw) = map.remove(REF_KEY) {
                        let id = raw.as_u64().ok_or(ValueError::InvalidRef)?;
                        return Ok(Value::Ref(ResourceId::new(id)));
                    }
                    if let Some(raw) = map.remove(BYTES_KEY) {
                        return decode_bytes(raw).map(Value::Bytes);
                    }
                }
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| Value::try_from(v).map(|v| (k, v)))
                        .collect::<Result<_, _>>()?,
                )
            }
        })
    }
}

fn decode_bytes(raw: serde_json::Value) -> Result<Vec<u8>, ValueError> {
    let serde_json::Value::Array(items) = raw else {
        return Err(ValueError::InvalidBytes);
    };
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or(ValueError::InvalidBytes)
        })
        .collect()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BYTES_KEY, bytes)?;
                map.end()
            }
            Value::Array(items) => items.serialize(serializer),
            Value::Object(entries) => entries.serialize(serializer),
            Value::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(REF_KEY, &id.get())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(json).map_err(serde::de::Error::custom)
    }
}

// === Conversions ===

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(serde_json::Number::from(n))
                }
            }
        )*
    };
}

number_from!(u8, u16, u32, u64, i32, i64);

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<ResourceId> for Value {
    fn from(id: ResourceId) -> Self {
        Value::Ref(id)
    }
}
