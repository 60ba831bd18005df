//! Key Specifications - Single and composite key declarations
//!
//! A key is either one field name or an ordered list of field names. Composite
//! keys are always read in declaration order, so a key tuple extracted from one
//! record lines up index by index with the tuple extracted from another.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::instance::Element;

/// Field name(s) forming a primary, foreign or local key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    /// A single field
    Single(String),
    /// An ordered list of fields
    Composite(Vec<String>),
}

impl KeySpec {
    /// Create a single-field key
    pub fn single(field: impl Into<String>) -> Self {
        KeySpec::Single(field.into())
    }

    /// Create a composite key from an ordered list of fields
    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeySpec::Composite(fields.into_iter().map(Into::into).collect())
    }

    /// The key's field names in declaration order
    pub fn fields(&self) -> &[String] {
        match self {
            KeySpec::Single(field) => std::slice::from_ref(field),
            KeySpec::Composite(fields) => fields,
        }
    }

    /// Number of fields in the key
    pub fn len(&self) -> usize {
        self.fields().len()
    }

    /// True when the key has no fields at all
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// True for keys made of more than one field
    pub fn is_composite(&self) -> bool {
        matches!(self, KeySpec::Composite(_))
    }

    /// The field name of a single key
    pub fn as_single(&self) -> Option<&str> {
        match self {
            KeySpec::Single(field) => Some(field),
            KeySpec::Composite(_) => None,
        }
    }

    /// Extract the key tuple from a record.
    ///
    /// Returns `None` when any part is missing or null.
    pub fn values(&self, element: &Element) -> Option<Vec<Value>> {
        let fields = self.fields();
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            match element.get(field) {
                None | Some(Value::Null) => return None,
                Some(value) => values.push(value.clone()),
            }
        }
        Some(values)
    }

    /// Turn an extracted tuple into the value stored in place of a nested
    /// record: the bare value for single keys, an array for composite keys.
    pub fn reference(&self, mut values: Vec<Value>) -> Value {
        match self {
            KeySpec::Single(_) if values.len() == 1 => values.remove(0),
            _ => Value::Array(values),
        }
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Single(field) => write!(f, "{}", field),
            KeySpec::Composite(fields) => write!(f, "[{}]", fields.join(", ")),
        }
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        KeySpec::Single("id".to_string())
    }
}

impl From<&str> for KeySpec {
    fn from(field: &str) -> Self {
        KeySpec::Single(field.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(field: String) -> Self {
        KeySpec::Single(field)
    }
}

impl From<Vec<String>> for KeySpec {
    fn from(fields: Vec<String>) -> Self {
        KeySpec::Composite(fields)
    }
}

impl From<Vec<&str>> for KeySpec {
    fn from(fields: Vec<&str>) -> Self {
        KeySpec::composite(fields)
    }
}

impl<const N: usize> From<[&str; N]> for KeySpec {
    fn from(fields: [&str; N]) -> Self {
        KeySpec::composite(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(value: Value) -> Element {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_key_spec_display() {
        assert_eq!(KeySpec::from("id").to_string(), "id");
        assert_eq!(KeySpec::from(["user_id", "role_id"]).to_string(), "[user_id, role_id]");
    }

    #[test]
    fn test_values_in_declaration_order() {
        let record = element(json!({ "b": 2, "a": 1 }));
        let key = KeySpec::from(["a", "b"]);
        assert_eq!(key.values(&record), Some(vec![json!(1), json!(2)]));
    }

    #[test]
    fn test_values_missing_or_null_part() {
        let record = element(json!({ "a": 1, "b": null }));
        assert_eq!(KeySpec::from(["a", "b"]).values(&record), None);
        assert_eq!(KeySpec::from("c").values(&record), None);
    }

    #[test]
    fn test_reference_shape() {
        assert_eq!(KeySpec::from("id").reference(vec![json!(7)]), json!(7));
        assert_eq!(
            KeySpec::from(["a", "b"]).reference(vec![json!(1), json!("x")]),
            json!([1, "x"])
        );
    }

    #[test]
    fn test_deserialize_untagged() {
        let single: KeySpec = serde_json::from_value(json!("id")).unwrap();
        let composite: KeySpec = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(single, KeySpec::single("id"));
        assert_eq!(composite.len(), 2);
        assert!(composite.is_composite());
    }
}
