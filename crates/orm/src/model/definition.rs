//! Model Definitions - Declared shape of a model type
//!
//! A definition names the entity, its primary key and an ordered list of
//! fields. Each field is either a plain attribute with a default value or a
//! relation descriptor.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::relationships::keys::validate_key_spec;
use crate::relationships::Relation;

use super::database::Database;
use super::primary_key::KeySpec;

/// A plain attribute field
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    default: Value,
}

impl Attribute {
    /// Create an attribute defaulting to null
    pub fn new() -> Self {
        Self { default: Value::Null }
    }

    /// Create an attribute with a default value
    pub fn with_default(default: Value) -> Self {
        Self { default }
    }

    /// The value used when a record does not carry this attribute
    pub fn default_value(&self) -> &Value {
        &self.default
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::new()
    }
}

/// One declared field of a model
#[derive(Debug, Clone)]
pub enum Field {
    Attribute(Attribute),
    Relation(Relation),
}

impl Field {
    /// The relation descriptor, if this field is a relation
    pub fn as_relation(&self) -> Option<&Relation> {
        match self {
            Field::Relation(relation) => Some(relation),
            Field::Attribute(_) => None,
        }
    }

    /// The attribute, if this field is a plain attribute
    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            Field::Attribute(attribute) => Some(attribute),
            Field::Relation(_) => None,
        }
    }
}

/// Declared shape of a model type
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    entity: String,
    key: KeySpec,
    fields: IndexMap<String, Field>,
}

impl ModelDefinition {
    /// Create a definition with primary key `id`
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            key: KeySpec::default(),
            fields: IndexMap::new(),
        }
    }

    /// Set the primary key
    pub fn primary_key(mut self, key: impl Into<KeySpec>) -> Self {
        self.key = key.into();
        self
    }

    /// Declare an attribute defaulting to null
    pub fn attr(self, name: impl Into<String>) -> Self {
        self.field(name, Field::Attribute(Attribute::new()))
    }

    /// Declare an attribute with a default value
    pub fn attr_default(self, name: impl Into<String>, default: Value) -> Self {
        self.field(name, Field::Attribute(Attribute::with_default(default)))
    }

    /// Declare a relation field
    pub fn relation(self, name: impl Into<String>, relation: Relation) -> Self {
        self.field(name, Field::Relation(relation))
    }

    fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// The entity name
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The primary key
    pub fn key_spec(&self) -> &KeySpec {
        &self.key
    }

    /// Look up a field by name
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// All fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Attribute fields in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.fields()
            .filter_map(|(name, field)| field.as_attribute().map(|attribute| (name, attribute)))
    }

    /// Relation fields in declaration order
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.fields()
            .filter_map(|(name, field)| field.as_relation().map(|relation| (name, relation)))
    }

    /// Look up a relation field by name
    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.fields.get(name).and_then(Field::as_relation)
    }

    /// Returns true if `field` is stored on records of this model, either as
    /// a declared attribute or as part of the primary key
    pub fn declares(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(Field::Attribute(_)))
            || self.key.fields().iter().any(|key| key == field)
    }

    /// Check that every field of `spec` is stored on this model
    pub(crate) fn require_fields(&self, spec: &KeySpec, role: &str) -> ModelResult<()> {
        for field in spec.fields() {
            if !self.declares(field) {
                return Err(ModelError::Configuration(format!(
                    "{} field '{}' is not an attribute of '{}'",
                    role, field, self.entity
                )));
            }
        }
        Ok(())
    }

    /// Validate the definition against the registry it belongs to
    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        if self.entity.is_empty() {
            return Err(ModelError::Configuration(
                "Model entity name cannot be empty".to_string(),
            ));
        }

        validate_key_spec(&self.key, "primary key")?;

        for (name, relation) in self.relations() {
            if relation.parent_entity() != self.entity {
                return Err(ModelError::Configuration(format!(
                    "Relation '{}' on '{}' was declared for parent '{}'",
                    name,
                    self.entity,
                    relation.parent_entity()
                )));
            }

            relation.validate(database).map_err(|err| match err {
                ModelError::Configuration(message) => ModelError::Configuration(format!(
                    "{}.{}: {}",
                    self.entity, name, message
                )),
                other => other,
            })?;
        }

        Ok(())
    }
}
