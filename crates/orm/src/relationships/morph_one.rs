//! MorphOne Relationship - Polymorphic one-to-one
//!
//! The related record stores the parent's key in `id` and the parent's
//! entity name in `type_field`. Both must match.

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::Dictionary;
use super::keys::{collect_keys, where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_one, registered, require_type_field};

/// MorphOne relationship - parent has one polymorphic related model
#[derive(Debug, Clone, PartialEq)]
pub struct MorphOne {
    parent: String,
    related: String,
    // morph id on the related model <- local key on the parent
    keys: KeyPairs,
    type_field: String,
}

impl MorphOne {
    /// Create a new MorphOne relationship
    pub fn new(
        parent: &str,
        related: &str,
        id: impl Into<KeySpec>,
        type_field: &str,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        Ok(Self {
            parent: parent.to_string(),
            related: related.to_string(),
            keys: KeyPairs::new(id, local_key)?,
            type_field: require_type_field(type_field)?,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    /// Morph id field(s) on the related model
    pub fn id(&self) -> &KeySpec {
        self.keys.foreign()
    }

    /// Discriminator field on the related model
    pub fn type_field(&self) -> &str {
        &self.type_field
    }

    pub fn local_key(&self) -> &KeySpec {
        self.keys.local()
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.one(&self.related, &self.parent)
    }

    /// Copy the parent's key and entity name into the child
    pub fn attach(&self, record: &Element, child: &mut Element) {
        attach_morph(&self.keys, &self.type_field, &self.parent, record, child);
    }

    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, models: &[Model]) -> Q {
        morph_constraints(&self.keys, &self.type_field, &self.parent, query, models)
    }

    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let dictionary = morph_dictionary(&self.keys, &self.type_field, &self.parent, query.get(true)?);

        for model in models.iter_mut() {
            let related = model
                .key(self.keys.local())
                .and_then(|key| dictionary.first(&DictionaryKey::encode(&key)).cloned());
            model.set_relation(name, RelationValue::from_option(related));
        }

        Ok(())
    }

    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_one(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        validate_morph(database, &self.keys, &self.type_field, &self.parent, &self.related)
    }
}

/// Shared attach for MorphOne and MorphMany
pub(crate) fn attach_morph(keys: &KeyPairs, type_field: &str, parent: &str, record: &Element, child: &mut Element) {
    keys.copy_local_to_foreign(record, child);
    child.insert(type_field.to_string(), Value::String(parent.to_string()));
}

/// Shared eager constraints for MorphOne and MorphMany
pub(crate) fn morph_constraints<Q: RelationQuery>(
    keys: &KeyPairs,
    type_field: &str,
    parent: &str,
    query: Q,
    models: &[Model],
) -> Q {
    where_keys_in(query, keys.foreign(), collect_keys(models, keys.local()))
        .where_eq(type_field, Value::String(parent.to_string()))
}

/// Group related records by morph id, keeping only those whose type field
/// names `parent`
pub(crate) fn morph_dictionary(
    keys: &KeyPairs,
    type_field: &str,
    parent: &str,
    results: Vec<Model>,
) -> Dictionary<Model> {
    let mut dictionary = Dictionary::new();
    for result in results {
        if result.get(type_field).and_then(Value::as_str) != Some(parent) {
            continue;
        }
        if let Some(key) = DictionaryKey::of(result.attributes(), keys.foreign()) {
            dictionary.insert(key, result);
        }
    }
    dictionary
}

pub(crate) fn validate_morph(
    database: &Database,
    keys: &KeyPairs,
    type_field: &str,
    parent: &str,
    related: &str,
) -> ModelResult<()> {
    registered(database, parent)?.require_fields(keys.local(), "Local key")?;
    let related = registered(database, related)?;
    related.require_fields(keys.foreign(), "Morph id")?;
    related.require_fields(&KeySpec::single(type_field), "Morph type")
}
