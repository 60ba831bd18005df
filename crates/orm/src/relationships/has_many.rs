//! HasMany Relationship - Parent owns an ordered collection of related records
//!
//! Same key layout as HasOne; every match is kept, in query order.

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::{map_to_dictionary, Dictionary};
use super::keys::{collect_keys, where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_many, registered};

/// HasMany relationship - parent model has many related models
#[derive(Debug, Clone, PartialEq)]
pub struct HasMany {
    parent: String,
    related: String,
    keys: KeyPairs,
}

impl HasMany {
    /// Create a new HasMany relationship
    pub fn new(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        local_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        Ok(Self {
            parent: parent.to_string(),
            related: related.to_string(),
            keys: KeyPairs::new(foreign_key, local_key)?,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    pub fn foreign_key(&self) -> &KeySpec {
        self.keys.foreign()
    }

    pub fn local_key(&self) -> &KeySpec {
        self.keys.local()
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.many(&self.related, &self.parent)
    }

    /// Copy the parent's local key into the child's foreign key
    pub fn attach(&self, record: &Element, child: &mut Element) {
        self.keys.copy_local_to_foreign(record, child);
    }

    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, models: &[Model]) -> Q {
        where_keys_in(query, self.keys.foreign(), collect_keys(models, self.keys.local()))
    }

    /// Assign every related record to its parent; unmatched parents get an
    /// empty collection
    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let dictionary = self.build_dictionary(query.get(true)?);

        for model in models.iter_mut() {
            let related = model
                .key(self.keys.local())
                .map(|key| dictionary.cloned(&DictionaryKey::encode(&key)))
                .unwrap_or_default();
            model.set_relation(name, RelationValue::Many(related));
        }

        Ok(())
    }

    fn build_dictionary(&self, results: Vec<Model>) -> Dictionary<Model> {
        map_to_dictionary(results, |result| {
            let key = DictionaryKey::of(result.attributes(), self.keys.foreign())?;
            Some((key, result))
        })
    }

    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_many(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        registered(database, &self.parent)?.require_fields(self.keys.local(), "Local key")?;
        registered(database, &self.related)?.require_fields(self.keys.foreign(), "Foreign key")
    }
}
