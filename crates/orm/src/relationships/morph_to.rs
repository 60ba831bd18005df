//! MorphTo Relationship - Inverse polymorphic relation
//!
//! The parent stores the related key in `id` and the related entity name in
//! `type_field`. Matching runs one sub-query per referenced type.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::{map_to_dictionary, Dictionary};
use super::keys::{where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_one, registered, require_type_field};

/// MorphTo relationship - parent belongs to one of several model types
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTo {
    parent: String,
    relateds: Vec<String>,
    // morph id on the parent <- owner key on the related model
    keys: KeyPairs,
    type_field: String,
}

impl MorphTo {
    /// Create a new MorphTo relationship
    pub fn new<I, S>(
        parent: &str,
        relateds: I,
        id: impl Into<KeySpec>,
        type_field: &str,
        owner_key: impl Into<KeySpec>,
    ) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let relateds: Vec<String> = relateds.into_iter().map(Into::into).collect();
        if relateds.is_empty() {
            return Err(ModelError::Configuration(format!(
                "MorphTo on '{}' must name at least one related model",
                parent
            )));
        }

        Ok(Self {
            parent: parent.to_string(),
            relateds,
            keys: KeyPairs::new(id, owner_key)?,
            type_field: require_type_field(type_field)?,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Morph id field(s) on the parent
    pub fn id(&self) -> &KeySpec {
        self.keys.foreign()
    }

    /// Discriminator field on the parent
    pub fn type_field(&self) -> &str {
        &self.type_field
    }

    /// Owner key on every related model
    pub fn owner_key(&self) -> &KeySpec {
        self.keys.local()
    }

    pub fn related_entities(&self) -> Vec<&str> {
        self.relateds.iter().map(String::as_str).collect()
    }

    fn is_related(&self, entity: &str) -> bool {
        self.relateds.iter().any(|related| related == entity)
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.union(&self.relateds, &self.type_field, &self.parent)
    }

    /// Copy the child's owner key and entity name into the parent
    pub fn attach(&self, record: &mut Element, child: &Element, child_entity: &str) {
        self.keys.copy_local_to_foreign(child, record);
        record.insert(self.type_field.clone(), Value::String(child_entity.to_string()));
    }

    /// Constraints depend on each parent's type, so they are applied per
    /// type while matching
    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, _models: &[Model]) -> Q {
        query
    }

    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let mut keys_by_type: IndexMap<String, Vec<Vec<Value>>> = IndexMap::new();
        let mut seen = HashSet::new();
        for model in models.iter() {
            let Some(entity) = self.morph_type(model) else {
                continue;
            };
            let Some(key) = model.key(self.id()) else {
                continue;
            };
            if seen.insert((entity.to_string(), DictionaryKey::encode(&key))) {
                keys_by_type.entry(entity.to_string()).or_default().push(key);
            }
        }

        let mut dictionaries: HashMap<String, Dictionary<Model>> = HashMap::new();
        for (entity, keys) in keys_by_type {
            let typed = query.for_entity(&entity)?;
            let results = where_keys_in(typed, self.owner_key(), keys).get(true)?;
            tracing::trace!("MorphTo '{}' resolved {} {} record(s)", name, results.len(), entity);

            let dictionary = map_to_dictionary(results, |result| {
                let key = DictionaryKey::of(result.attributes(), self.owner_key())?;
                Some((key, result))
            });
            dictionaries.insert(entity, dictionary);
        }

        for model in models.iter_mut() {
            let related = self.morph_type(model).and_then(|entity| {
                let key = DictionaryKey::encode(&model.key(self.id())?);
                dictionaries.get(entity)?.first(&key).cloned()
            });
            model.set_relation(name, RelationValue::from_option(related));
        }

        Ok(())
    }

    /// The parent's declared related type, if it is one of this relation's
    fn morph_type<'a>(&self, model: &'a Model) -> Option<&'a str> {
        model
            .get(&self.type_field)
            .and_then(Value::as_str)
            .filter(|entity| self.is_related(entity))
    }

    /// Build the related instance for `morph_type`; unknown or missing types
    /// resolve to null
    pub fn make(&self, database: &Database, raw: Option<&Value>, morph_type: Option<&str>) -> ModelResult<RelationValue> {
        match morph_type {
            Some(entity) if self.is_related(entity) => make_one(database, entity, raw),
            _ => Ok(RelationValue::Null),
        }
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        let parent = registered(database, &self.parent)?;
        parent.require_fields(self.id(), "Morph id")?;
        parent.require_fields(&KeySpec::single(self.type_field.as_str()), "Morph type")?;

        for related in &self.relateds {
            registered(database, related)?.require_fields(self.owner_key(), "Owner key")?;
        }

        Ok(())
    }
}
