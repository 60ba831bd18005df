//! HasManyBy Relationship - Related records list the keys of their parents
//!
//! The foreign key is an array field on the related record holding the local
//! key of every parent it belongs to. A related record listing several
//! parents appears in each of their collections. Only single-field keys make
//! sense for an array field, so composite keys are rejected.

use serde_json::Value;
use std::collections::HashSet;

use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::Dictionary;
use super::keys::{collect_keys, DictionaryKey, KeyPairs};
use super::relation::{make_many, registered};

/// HasManyBy relationship - related models hold an array of parent keys
#[derive(Debug, Clone, PartialEq)]
pub struct HasManyBy {
    parent: String,
    related: String,
    foreign_key: String,
    local_key: String,
}

impl HasManyBy {
    /// Create a new HasManyBy relationship
    pub fn new(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        let keys = KeyPairs::new(foreign_key, local_key)?;
        let (Some(foreign_key), Some(local_key)) = (keys.foreign().as_single(), keys.local().as_single()) else {
            return Err(ModelError::Configuration(format!(
                "HasManyBy from '{}' to '{}' only supports single-field keys, got {} and {}",
                parent,
                related,
                keys.foreign(),
                keys.local()
            )));
        };

        Ok(Self {
            parent: parent.to_string(),
            related: related.to_string(),
            foreign_key: foreign_key.to_string(),
            local_key: local_key.to_string(),
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    /// Array field on the related model
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.many(&self.related, &self.parent)
    }

    /// Add the parent's local key to the child's key array
    pub fn attach(&self, record: &Element, child: &mut Element) {
        let Some(key) = record.get(&self.local_key).filter(|key| !key.is_null()) else {
            return;
        };

        let slot = child.entry(self.foreign_key.clone()).or_insert(Value::Null);
        if let Value::Array(keys) = &mut *slot {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        } else if slot.is_null() {
            *slot = Value::Array(vec![key.clone()]);
        } else {
            let previous = slot.take();
            let mut keys = vec![previous];
            if keys[0] != *key {
                keys.push(key.clone());
            }
            *slot = Value::Array(keys);
        }
    }

    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, models: &[Model]) -> Q {
        let keys = collect_keys(models, &KeySpec::single(self.local_key.as_str()))
            .into_iter()
            .filter_map(|key| key.into_iter().next())
            .collect();
        query.where_contains_any(&self.foreign_key, keys)
    }

    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let dictionary = self.build_dictionary(query.get(true)?);

        for model in models.iter_mut() {
            let related = model
                .get(&self.local_key)
                .filter(|key| !key.is_null())
                .map(|key| dictionary.cloned(&DictionaryKey::from_value(key)))
                .unwrap_or_default();
            model.set_relation(name, RelationValue::Many(related));
        }

        Ok(())
    }

    /// Group each related record under every key in its array
    fn build_dictionary(&self, results: Vec<Model>) -> Dictionary<Model> {
        let mut dictionary = Dictionary::new();
        for result in results {
            let Some(Value::Array(keys)) = result.get(&self.foreign_key) else {
                tracing::trace!(
                    "Record of '{}' has no '{}' array, left unmatched",
                    self.related,
                    self.foreign_key
                );
                continue;
            };

            let mut seen = HashSet::new();
            for key in keys.iter().filter(|key| !key.is_null()) {
                let key = DictionaryKey::from_value(key);
                if seen.insert(key.clone()) {
                    dictionary.insert(key, result.clone());
                }
            }
        }
        dictionary
    }

    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_many(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        registered(database, &self.parent)?
            .require_fields(&KeySpec::single(self.local_key.as_str()), "Local key")?;
        registered(database, &self.related)?
            .require_fields(&KeySpec::single(self.foreign_key.as_str()), "Foreign key")
    }
}
