//! Capture-side argument trees.
//!
//! The interception layer hands over descriptors and command arguments as
//! [`Arg`] trees. They look like snapshot [`Value`]s except that live objects
//! appear as [`Handle`]s, which only the capturing process understands.

use std::collections::BTreeMap;

use framescope_shared::Value;

/// Opaque key for a live object, chosen by the interception layer.
///
/// The tracker never dereferences it or derives lifetime from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle:{:#x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Arg {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Arg>),
    Object(BTreeMap<String, Arg>),
    Handle(Handle),
}

impl Arg {
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Arg)>,
    {
        Arg::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array(items: impl IntoIterator<Item = Arg>) -> Self {
        Arg::Array(items.into_iter().collect())
    }

    /// Handles anywhere in the tree, depth first.
    pub fn handles(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        self.collect_handles(&mut out);
        out
    }

    fn collect_handles(&self, out: &mut Vec<Handle>) {
        match self {
            Arg::Handle(handle) => out.push(*handle),
            Arg::Array(items) => items.iter().for_each(|item| item.collect_handles(out)),
            Arg::Object(map) => map.values().for_each(|item| item.collect_handles(out)),
            _ => {}
        }
    }
}

impl From<Handle> for Arg {
    fn from(handle: Handle) -> Self {
        Arg::Handle(handle)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(n: $ty) -> Self {
                    Arg::Number(serde_json::Number::from(n))
                }
            }
        )*
    };
}

number_from!(u8, u16, u32, u64, i32, i64);

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Arg::Null, Arg::Number)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::String(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::String(s)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(bytes: Vec<u8>) -> Self {
        Arg::Bytes(bytes)
    }
}

impl From<&[u8]> for Arg {
    fn from(bytes: &[u8]) -> Self {
        Arg::Bytes(bytes.to_vec())
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::Array(items)
    }
}

/// Plain JSON carries no handles, so every JSON document is a valid `Arg`.
impl From<serde_json::Value> for Arg {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Arg::Null,
            serde_json::Value::Bool(b) => Arg::Bool(b),
            serde_json::Value::Number(n) => Arg::Number(n),
            serde_json::Value::String(s) => Arg::String(s),
            serde_json::Value::Array(items) => Arg::Array(items.into_iter().map(Arg::from).collect()),
            serde_json::Value::Object(map) => {
                Arg::Object(map.into_iter().map(|(k, v)| (k, Arg::from(v))).collect())
            }
        }
    }
}

/// Handle-free snapshot values convert back; references become `Null`.
impl From<&Value> for Arg {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null | Value::Ref(_) => Arg::Null,
            Value::Bool(b) => Arg::Bool(*b),
            Value::Number(n) => Arg::Number(n.clone()),
            Value::String(s) => Arg::String(s.clone()),
            Value::Bytes(b) => Arg::Bytes(b.clone()),
            Value::Array(items) => Arg::Array(items.iter().map(Arg::from).collect()),
            Value::Object(map) => {
                Arg::Object(map.iter().map(|(k, v)| (k.clone(), Arg::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_collected_depth_first() {
        let arg = Arg::object([
            ("layout", Arg::from(Handle::new(1))),
            (
                "entries",
                Arg::array([
                    Arg::object([("resource", Arg::from(Handle::new(2)))]),
                    Arg::object([("resource", Arg::from(Handle::new(3)))]),
                ]),
            ),
        ]);
        assert_eq!(
            arg.handles(),
            vec![Handle::new(2), Handle::new(3), Handle::new(1)]
        );
    }

    #[test]
    fn test_json_documents_convert_without_handles() {
        let arg = Arg::from(serde_json::json!({ "size": 16, "usage": [1, 2], "label": "vb" }));
        assert!(arg.handles().is_empty());
        assert!(matches!(arg, Arg::Object(ref map) if map.len() == 3));
    }
}
