//! Descriptor trees with references resolved to live device objects.

use std::collections::BTreeMap;

/// A snapshot [`Value`](framescope_shared::Value) after resolution: every
/// `Ref` has become the device's own resource handle `R`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<R> {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Resolved<R>>),
    Object(BTreeMap<String, Resolved<R>>),
    Resource(R),
}

impl<R> Default for Resolved<R> {
    fn default() -> Self {
        Resolved::Null
    }
}

impl<R> Resolved<R> {
    pub fn is_null(&self) -> bool {
        matches!(self, Resolved::Null)
    }

    pub fn get(&self, key: &str) -> Option<&Resolved<R>> {
        match self {
            Resolved::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Like [`get`](Self::get), but an explicit `null` counts as absent.
    pub fn field(&self, key: &str) -> Option<&Resolved<R>> {
        self.get(key).filter(|value| !value.is_null())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Resolved::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Resolved::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Resolved::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            }),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|n| u32::try_from(n).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Resolved::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Resolved::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Resolved::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Resolved<R>]> {
        match self {
            Resolved::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Resolved<R>>> {
        match self {
            Resolved::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&R> {
        match self {
            Resolved::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    /// Applies `f` to every resource, keeping the tree shape.
    pub fn map<S>(&self, f: &mut impl FnMut(&R) -> S) -> Resolved<S> {
        match self {
            Resolved::Null => Resolved::Null,
            Resolved::Bool(b) => Resolved::Bool(*b),
            Resolved::Number(n) => Resolved::Number(n.clone()),
            Resolved::String(s) => Resolved::String(s.clone()),
            Resolved::Bytes(bytes) => Resolved::Bytes(bytes.clone()),
            Resolved::Array(items) => Resolved::Array(items.iter().map(|i| i.map(f)).collect()),
            Resolved::Object(map) => Resolved::Object(
                map.iter().map(|(k, v)| (k.clone(), v.map(f))).collect(),
            ),
            Resolved::Resource(resource) => Resolved::Resource(f(resource)),
        }
    }

    /// Plain JSON view; resources are rendered by `f`.
    pub fn to_json(&self, f: &mut impl FnMut(&R) -> serde_json::Value) -> serde_json::Value {
        match self {
            Resolved::Null => serde_json::Value::Null,
            Resolved::Bool(b) => serde_json::Value::Bool(*b),
            Resolved::Number(n) => serde_json::Value::Number(n.clone()),
            Resolved::String(s) => serde_json::Value::String(s.clone()),
            Resolved::Bytes(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| (*b).into()).collect())
            }
            Resolved::Array(items) => {
                serde_json::Value::Array(items.iter().map(|i| i.to_json(f)).collect())
            }
            Resolved::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json(f))).collect(),
            ),
            Resolved::Resource(resource) => f(resource),
        }
    }
}

impl<R> From<&str> for Resolved<R> {
    fn from(s: &str) -> Self {
        Resolved::String(s.to_owned())
    }
}

impl<R> From<u64> for Resolved<R> {
    fn from(n: u64) -> Self {
        Resolved::Number(n.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_treats_null_as_absent() {
        let value: Resolved<u8> = Resolved::Object(
            [
                ("size".to_string(), Resolved::from(16u64)),
                ("label".to_string(), Resolved::Null),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(value.field("size").and_then(Resolved::as_u32), Some(16));
        assert!(value.get("label").is_some());
        assert!(value.field("label").is_none());
    }

    #[test]
    fn test_map_preserves_shape() {
        let value = Resolved::Array(vec![Resolved::Resource(2u8), Resolved::from("x")]);
        let mapped = value.map(&mut |r| u32::from(*r) * 10);
        assert_eq!(
            mapped,
            Resolved::Array(vec![Resolved::Resource(20u32), Resolved::from("x")])
        );
    }
}
