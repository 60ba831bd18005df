//! HasManyThrough Relationship - Related records reached via an intermediate model
//!
//! Parent `local_key` is referenced by the through model's `first_key`; the
//! through model's `second_local_key` is referenced by the related model's
//! `second_key`. Nested data under this relation is normalized as plain
//! related records and no keys are written, since the intermediate record is
//! not part of the payload.

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::map_to_dictionary;
use super::keys::{collect_keys, where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_many, ordered_results, registered};

/// HasManyThrough relationship - parent reaches related models through another model
#[derive(Debug, Clone, PartialEq)]
pub struct HasManyThrough {
    parent: String,
    related: String,
    through: String,
    // first_key on the through model <- local_key on the parent
    first: KeyPairs,
    // second_key on the related model <- second_local_key on the through model
    second: KeyPairs,
}

impl HasManyThrough {
    /// Create a new HasManyThrough relationship
    pub fn new(
        parent: &str,
        related: &str,
        through: &str,
        first_key: impl Into<KeySpec>,
        second_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
        second_local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        Ok(Self {
            parent: parent.to_string(),
            related: related.to_string(),
            through: through.to_string(),
            first: KeyPairs::new(first_key, local_key)?,
            second: KeyPairs::new(second_key, second_local_key)?,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    /// The intermediate model
    pub fn through(&self) -> &str {
        &self.through
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.many(&self.related, &self.parent)
    }

    /// Nothing to copy: the linking record is not part of the nested data
    pub fn attach(&self, _record: &Element, _child: &mut Element) {}

    /// The related keys come from the intermediate rows, which are read once
    /// while matching so narrowing and matching see the same rows
    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, _models: &[Model]) -> Q {
        query
    }

    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let through = self.through_rows(&query, models)?;
        let keys = collect_keys(&through, self.second.local());
        let results = where_keys_in(query, self.second.foreign(), keys).get(true)?;

        let through_dictionary = map_to_dictionary(through, |row| {
            let parent_key = DictionaryKey::of(row.attributes(), self.first.foreign())?;
            let link_key = DictionaryKey::of(row.attributes(), self.second.local())?;
            Some((parent_key, link_key))
        });
        let related_dictionary = map_to_dictionary(results.iter().enumerate(), |(index, result)| {
            let key = DictionaryKey::of(result.attributes(), self.second.foreign())?;
            Some((key, index))
        });

        for model in models.iter_mut() {
            let mut positions = Vec::new();
            if let Some(key) = DictionaryKey::of(model.attributes(), self.first.local()) {
                for link in through_dictionary.get(&key).unwrap_or_default() {
                    positions.extend_from_slice(related_dictionary.get(link).unwrap_or_default());
                }
            }
            model.set_relation(name, RelationValue::Many(ordered_results(&results, positions)));
        }

        Ok(())
    }

    /// Intermediate rows reachable from `models`
    fn through_rows<Q: RelationQuery>(&self, query: &Q, models: &[Model]) -> ModelResult<Vec<Model>> {
        let keys = collect_keys(models, self.first.local());
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let through = query.new_query(&self.through)?;
        where_keys_in(through, self.first.foreign(), keys).get(false)
    }

    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_many(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        registered(database, &self.parent)?.require_fields(self.first.local(), "Local key")?;
        let through = registered(database, &self.through)?;
        through.require_fields(self.first.foreign(), "First key")?;
        through.require_fields(self.second.local(), "Second local key")?;
        registered(database, &self.related)?.require_fields(self.second.foreign(), "Second key")
    }
}
