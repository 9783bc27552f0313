//! The decoded, in-memory form of a document.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Ordered object storage. Keys are unique and keep insertion order.
pub type ObjectMap = IndexMap<String, StructuredValue>;

/// A JSON-like value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<StructuredValue>),
    Object(ObjectMap),
}

/// Type tag used by the tree projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Null,
    #[serde(rename = "boolean")]
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Object => "object",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StructuredValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            StructuredValue::Null => ValueType::Null,
            StructuredValue::Bool(_) => ValueType::Bool,
            StructuredValue::Number(_) => ValueType::Number,
            StructuredValue::String(_) => ValueType::String,
            StructuredValue::Array(_) => ValueType::Array,
            StructuredValue::Object(_) => ValueType::Object,
        }
    }

    /// True for arrays and objects.
    pub fn is_container(&self) -> bool {
        matches!(self, StructuredValue::Array(_) | StructuredValue::Object(_))
    }

    pub fn as_array(&self) -> Option<&Vec<StructuredValue>> {
        match self {
            StructuredValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            StructuredValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Stringified form of a leaf, as used by search. Containers have none.
    pub fn leaf_text(&self) -> Option<String> {
        match self {
            StructuredValue::Null => Some("null".to_string()),
            StructuredValue::Bool(b) => Some(b.to_string()),
            StructuredValue::Number(n) => Some(n.to_string()),
            StructuredValue::String(s) => Some(s.clone()),
            StructuredValue::Array(_) | StructuredValue::Object(_) => None,
        }
    }

    /// Build a number from an `f64`. Non-finite input has no representation.
    pub fn from_f64(f: f64) -> Option<Self> {
        serde_json::Number::from_f64(f).map(StructuredValue::Number)
    }
}

impl From<bool> for StructuredValue {
    fn from(b: bool) -> Self {
        StructuredValue::Bool(b)
    }
}

impl From<i64> for StructuredValue {
    fn from(n: i64) -> Self {
        StructuredValue::Number(n.into())
    }
}

impl From<&str> for StructuredValue {
    fn from(s: &str) -> Self {
        StructuredValue::String(s.to_string())
    }
}

impl From<String> for StructuredValue {
    fn from(s: String) -> Self {
        StructuredValue::String(s)
    }
}

impl From<serde_json::Value> for StructuredValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => StructuredValue::Null,
            serde_json::Value::Bool(b) => StructuredValue::Bool(b),
            serde_json::Value::Number(n) => StructuredValue::Number(n),
            serde_json::Value::String(s) => StructuredValue::String(s),
            serde_json::Value::Array(items) => {
                StructuredValue::Array(items.into_iter().map(StructuredValue::from).collect())
            }
            serde_json::Value::Object(map) => StructuredValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, StructuredValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&StructuredValue> for serde_json::Value {
    fn from(v: &StructuredValue) -> Self {
        match v {
            StructuredValue::Null => serde_json::Value::Null,
            StructuredValue::Bool(b) => serde_json::Value::Bool(*b),
            StructuredValue::Number(n) => serde_json::Value::Number(n.clone()),
            StructuredValue::String(s) => serde_json::Value::String(s.clone()),
            StructuredValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            StructuredValue::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for StructuredValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StructuredValue::Null => serializer.serialize_unit(),
            StructuredValue::Bool(b) => serializer.serialize_bool(*b),
            StructuredValue::Number(n) => n.serialize(serializer),
            StructuredValue::String(s) => serializer.serialize_str(s),
            StructuredValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            StructuredValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_key_order() {
        let value = StructuredValue::from(json!({"z": 1, "a": [true, null], "m": "x"}));
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn leaf_text_for_scalars_only() {
        assert_eq!(StructuredValue::from(3).leaf_text(), Some("3".to_string()));
        assert_eq!(StructuredValue::Null.leaf_text(), Some("null".to_string()));
        assert_eq!(StructuredValue::Array(vec![]).leaf_text(), None);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(StructuredValue::from_f64(f64::NAN).is_none());
        assert!(StructuredValue::from_f64(1.5).is_some());
    }

    #[test]
    fn serializes_as_plain_json() {
        let value = StructuredValue::from(json!({"a": [1, "b"], "c": null}));
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"a":[1,"b"],"c":null}"#);
    }
}
