//! Key Mapping - Pairwise foreign/local key handling shared by every relation
//!
//! `KeyPairs` validates at construction that the foreign and local key specs
//! line up, then hands out `(foreign, local)` field pairs by index. Attach,
//! eager constraints and matching all walk the same pairs, so a composite key
//! behaves identically in every phase.
//!
//! `DictionaryKey` is the hashable form of a key tuple. Every part is written
//! as a type tag, the byte length of its text and the text itself, so tuples
//! never collide through separator tricks: `["1,2"]`, `["1", "2"]`, `[1, 2]`
//! and `[12]` all encode differently, and the number `1` is distinct from the
//! string `"1"`.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::{self, Write};

use crate::error::{ModelError, ModelResult};
use crate::model::{Element, KeySpec, Model};
use crate::query::RelationQuery;

/// Unambiguous, hashable encoding of a key tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DictionaryKey(String);

impl DictionaryKey {
    /// Encode an ordered tuple of key parts
    pub fn encode(parts: &[Value]) -> Self {
        let mut encoded = String::new();
        for part in parts {
            encode_part(&mut encoded, part);
        }
        DictionaryKey(encoded)
    }

    /// Encode a single key value
    pub fn from_value(value: &Value) -> Self {
        Self::encode(std::slice::from_ref(value))
    }

    /// Extract and encode the key of `spec` from a record.
    ///
    /// Returns `None` when any part is missing or null.
    pub fn of(element: &Element, spec: &KeySpec) -> Option<Self> {
        spec.values(element).map(|values| Self::encode(&values))
    }

    /// The encoded form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DictionaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode_part(out: &mut String, part: &Value) {
    let (tag, text) = match part {
        Value::Null => ('n', String::new()),
        Value::Bool(flag) => ('b', flag.to_string()),
        Value::Number(number) => ('d', number.to_string()),
        Value::String(text) => ('s', text.clone()),
        Value::Array(_) | Value::Object(_) => ('j', part.to_string()),
    };
    // Writing into a String cannot fail.
    let _ = write!(out, "{}{}:{}", tag, text.len(), text);
}

/// Index-aligned foreign/local key pairs of a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairs {
    foreign: KeySpec,
    local: KeySpec,
}

impl KeyPairs {
    /// Pair a foreign key spec with a local key spec.
    ///
    /// Both specs must name the same, non-zero number of fields and no field
    /// name may be empty.
    pub fn new(foreign: impl Into<KeySpec>, local: impl Into<KeySpec>) -> ModelResult<Self> {
        let foreign = foreign.into();
        let local = local.into();

        validate_key_spec(&foreign, "foreign key")?;
        validate_key_spec(&local, "local key")?;

        if foreign.len() != local.len() {
            return Err(ModelError::Configuration(format!(
                "Foreign key {} has {} field(s) but local key {} has {}",
                foreign,
                foreign.len(),
                local,
                local.len()
            )));
        }

        Ok(Self { foreign, local })
    }

    /// The foreign key spec
    pub fn foreign(&self) -> &KeySpec {
        &self.foreign
    }

    /// The local key spec
    pub fn local(&self) -> &KeySpec {
        &self.local
    }

    /// Number of field pairs
    pub fn len(&self) -> usize {
        self.foreign.len()
    }

    /// Always false for a validated pair set
    pub fn is_empty(&self) -> bool {
        self.foreign.is_empty()
    }

    /// Iterate `(foreign, local)` field pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let foreign = self.foreign.fields();
        let local = self.local.fields();
        (0..foreign.len()).map(move |index| (foreign[index].as_str(), local[index].as_str()))
    }

    /// Invoke `f` once per `(foreign, local)` field pair
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str),
    {
        for (foreign, local) in self.iter() {
            f(foreign, local);
        }
    }

    /// Copy each local field of `source` into the paired foreign field of
    /// `target`. Missing source values leave the target untouched.
    pub(crate) fn copy_local_to_foreign(&self, source: &Element, target: &mut Element) {
        self.for_each(|foreign, local| {
            if let Some(value) = source.get(local) {
                if !value.is_null() {
                    target.insert(foreign.to_string(), value.clone());
                }
            }
        });
    }
}

/// Reject empty key specs and empty field names
pub fn validate_key_spec(spec: &KeySpec, what: &str) -> ModelResult<()> {
    if spec.is_empty() {
        return Err(ModelError::Configuration(format!(
            "The {} must name at least one field",
            what
        )));
    }

    if spec.fields().iter().any(|field| field.is_empty()) {
        return Err(ModelError::Configuration(format!(
            "The {} {} contains an empty field name",
            what, spec
        )));
    }

    Ok(())
}

/// Collect the distinct, fully populated key tuples of `models`, keeping the
/// order of first appearance. Models with a missing key part are skipped.
pub(crate) fn collect_keys(models: &[Model], spec: &KeySpec) -> Vec<Vec<Value>> {
    collect_element_keys(models.iter().map(Model::attributes), spec)
}

/// Same as [`collect_keys`] over raw records
pub(crate) fn collect_element_keys<'a, I>(elements: I, spec: &KeySpec) -> Vec<Vec<Value>>
where
    I: IntoIterator<Item = &'a Element>,
{
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for element in elements {
        if let Some(values) = spec.values(element) {
            if seen.insert(DictionaryKey::encode(&values)) {
                keys.push(values);
            }
        }
    }
    keys
}

/// Narrow `query` to rows whose `spec` fields equal one of `keys`.
///
/// Single keys become a plain `where_in`. Composite keys become one tuple
/// condition so every part has to match the same key, never parts of different
/// keys.
pub(crate) fn where_keys_in<Q: RelationQuery>(query: Q, spec: &KeySpec, keys: Vec<Vec<Value>>) -> Q {
    match spec {
        KeySpec::Single(field) => {
            let values = keys
                .into_iter()
                .filter_map(|key| key.into_iter().next())
                .collect();
            query.where_in(field, values)
        }
        KeySpec::Composite(fields) => query.where_tuple_in(fields, keys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dictionary_key_is_unambiguous() {
        let joined = DictionaryKey::encode(&[json!("1,2")]);
        let split = DictionaryKey::encode(&[json!("1"), json!("2")]);
        let numbers = DictionaryKey::encode(&[json!(1), json!(2)]);
        let merged = DictionaryKey::encode(&[json!(12)]);
        let array = DictionaryKey::encode(&[json!(["1", "2"])]);

        let all = [&joined, &split, &numbers, &merged, &array];
        for (i, left) in all.iter().enumerate() {
            for right in all.iter().skip(i + 1) {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn test_dictionary_key_separator_injection() {
        // A part that embeds the encoding of a second part must not collide.
        let crafted = DictionaryKey::encode(&[json!("a"), json!("s1:b")]);
        let honest = DictionaryKey::encode(&[json!("as1:b")]);
        assert_ne!(crafted, honest);
    }

    #[test]
    fn test_dictionary_key_types_are_distinct() {
        assert_ne!(DictionaryKey::from_value(&json!(1)), DictionaryKey::from_value(&json!("1")));
        assert_ne!(DictionaryKey::from_value(&json!(true)), DictionaryKey::from_value(&json!("true")));
        assert_eq!(DictionaryKey::from_value(&json!(5)), DictionaryKey::encode(&[json!(5)]));
    }

    #[test]
    fn test_key_pairs_rejects_mismatched_arity() {
        let err = KeyPairs::new(["a", "b"], "id").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("[a, b]"));
    }

    #[test]
    fn test_key_pairs_rejects_empty_fields() {
        assert!(KeyPairs::new("", "id").is_err());
        assert!(KeyPairs::new(Vec::<String>::new(), Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_key_pairs_iterates_in_order() {
        let pairs = KeyPairs::new(["owner_a", "owner_b"], ["a", "b"]).unwrap();
        let collected: Vec<(&str, &str)> = pairs.iter().collect();
        assert_eq!(collected, vec![("owner_a", "a"), ("owner_b", "b")]);

        let mut visited = Vec::new();
        pairs.for_each(|foreign, local| visited.push(format!("{}<-{}", foreign, local)));
        assert_eq!(visited, vec!["owner_a<-a", "owner_b<-b"]);
    }

    #[test]
    fn test_copy_local_to_foreign_skips_missing() {
        let pairs = KeyPairs::new(["owner_a", "owner_b"], ["a", "b"]).unwrap();
        let Value::Object(source) = json!({ "a": 1 }) else { unreachable!() };
        let mut target = Element::new();
        pairs.copy_local_to_foreign(&source, &mut target);
        assert_eq!(Value::Object(target), json!({ "owner_a": 1 }));
    }

    #[test]
    fn test_collect_keys_dedups_and_skips_nulls() {
        let models: Vec<Model> = [json!({ "id": 1 }), json!({ "id": null }), json!({ "id": 1 }), json!({ "id": 2 })]
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => Model::new("users", map),
                _ => unreachable!(),
            })
            .collect();

        let keys = collect_keys(&models, &KeySpec::from("id"));
        assert_eq!(keys, vec![vec![json!(1)], vec![json!(2)]]);
    }
}
