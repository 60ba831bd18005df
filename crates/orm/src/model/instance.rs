//! Model Instances - Records with attribute values and resolved relation slots

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::primary_key::KeySpec;

/// A raw record as it appears in payloads and flat tables
pub type Element = serde_json::Map<String, Value>;

/// The resolved value of one relation slot
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    /// To-one relation with no related record
    Null,
    /// To-one relation resolved to a record
    One(Box<Model>),
    /// To-many relation; empty when nothing matched
    Many(Vec<Model>),
}

impl RelationValue {
    /// Build a to-one value from an optional model
    pub fn from_option(model: Option<Model>) -> Self {
        match model {
            Some(model) => RelationValue::One(Box::new(model)),
            None => RelationValue::Null,
        }
    }

    /// Returns true for an unresolved to-one slot
    pub fn is_null(&self) -> bool {
        matches!(self, RelationValue::Null)
    }

    /// The related model of a to-one slot
    pub fn as_one(&self) -> Option<&Model> {
        match self {
            RelationValue::One(model) => Some(model),
            _ => None,
        }
    }

    /// The related models of a to-many slot
    pub fn as_many(&self) -> Option<&[Model]> {
        match self {
            RelationValue::Many(models) => Some(models),
            _ => None,
        }
    }

    /// Number of related models held by the slot
    pub fn len(&self) -> usize {
        match self {
            RelationValue::Null => 0,
            RelationValue::One(_) => 1,
            RelationValue::Many(models) => models.len(),
        }
    }

    /// Returns true when the slot holds no model
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the slot as nested JSON
    pub fn to_json(&self) -> Value {
        match self {
            RelationValue::Null => Value::Null,
            RelationValue::One(model) => model.to_json(),
            RelationValue::Many(models) => Value::Array(models.iter().map(Model::to_json).collect()),
        }
    }
}

/// A model instance: attribute values plus zero or more resolved relation slots
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    entity: String,
    attributes: Element,
    relations: IndexMap<String, RelationValue>,
}

impl Model {
    /// Create an instance with no relation slots
    pub fn new(entity: impl Into<String>, attributes: Element) -> Self {
        Self {
            entity: entity.into(),
            attributes,
            relations: IndexMap::new(),
        }
    }

    /// The model type this instance belongs to
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Read one attribute
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// All attribute values
    pub fn attributes(&self) -> &Element {
        &self.attributes
    }

    /// Consume the instance, keeping only its attributes
    pub fn into_attributes(self) -> Element {
        self.attributes
    }

    /// Extract a key tuple from the attributes
    pub fn key(&self, spec: &KeySpec) -> Option<Vec<Value>> {
        spec.values(&self.attributes)
    }

    /// Read a resolved relation slot
    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    /// Returns true once the slot has been assigned
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Iterate over assigned relation slots in assignment order
    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationValue)> {
        self.relations.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Assign a relation slot, replacing any previous value
    pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
        self.relations.insert(name.into(), value);
    }

    /// Render the instance as nested JSON: attributes first, then relation slots
    pub fn to_json(&self) -> Value {
        let mut object = self.attributes.clone();
        for (name, value) in &self.relations {
            object.insert(name.clone(), value.to_json());
        }
        Value::Object(object)
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + self.relations.len()))?;
        for (name, value) in &self.attributes {
            if !self.relations.contains_key(name) {
                map.serialize_entry(name, value)?;
            }
        }
        for (name, value) in &self.relations {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for RelationValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationValue::Null => serializer.serialize_none(),
            RelationValue::One(model) => model.serialize(serializer),
            RelationValue::Many(models) => {
                let mut seq = serializer.serialize_seq(Some(models.len()))?;
                for model in models {
                    seq.serialize_element(model)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: i64) -> Model {
        let Value::Object(attributes) = json!({ "id": id, "name": format!("user {}", id) }) else {
            unreachable!()
        };
        Model::new("users", attributes)
    }

    #[test]
    fn test_relation_slots() {
        let mut model = user(1);
        assert!(!model.has_relation("posts"));

        model.set_relation("posts", RelationValue::Many(vec![]));
        model.set_relation("profile", RelationValue::Null);

        assert!(model.relation("posts").unwrap().is_empty());
        assert!(model.relation("profile").unwrap().is_null());
        let names: Vec<&str> = model.relations().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["posts", "profile"]);
    }

    #[test]
    fn test_to_json_nests_relations() {
        let mut model = user(1);
        model.set_relation("friend", RelationValue::from_option(Some(user(2))));
        model.set_relation("posts", RelationValue::Many(vec![]));

        assert_eq!(
            model.to_json(),
            json!({
                "id": 1,
                "name": "user 1",
                "friend": { "id": 2, "name": "user 2" },
                "posts": []
            })
        );
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let mut model = user(3);
        model.set_relation("friend", RelationValue::Null);
        assert_eq!(serde_json::to_value(&model).unwrap(), model.to_json());
    }

    #[test]
    fn test_relation_value_accessors() {
        let one = RelationValue::One(Box::new(user(1)));
        assert_eq!(one.as_one().map(Model::entity), Some("users"));
        assert!(one.as_many().is_none());
        assert_eq!(one.len(), 1);

        let many = RelationValue::Many(vec![user(1), user(2)]);
        assert_eq!(many.as_many().map(<[Model]>::len), Some(2));
    }
}
