//! HasOne Relationship - Parent owns at most one related record
//!
//! The foreign key lives on the related record and points at the parent's
//! local key.

use crate::error::ModelResult;
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::{map_to_dictionary, Dictionary};
use super::keys::{collect_keys, where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_one, registered};

/// HasOne relationship - parent model has one related model
#[derive(Debug, Clone, PartialEq)]
pub struct HasOne {
    parent: String,
    related: String,
    keys: KeyPairs,
}

impl HasOne {
    /// Create a new HasOne relationship
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

    /// Foreign key on the related model
    pub fn foreign_key(&self) -> &KeySpec {
        self.keys.foreign()
    }

    /// Local key on the parent model
    pub fn local_key(&self) -> &KeySpec {
        self.keys.local()
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.one(&self.related, &self.parent)
    }

    /// Copy the parent's local key into the child's foreign key
    pub fn attach(&self, record: &Element, child: &mut Element) {
        self.keys.copy_local_to_foreign(record, child);
    }

    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, models: &[Model]) -> Q {
        where_keys_in(query, self.keys.foreign(), collect_keys(models, self.keys.local()))
    }

    /// Assign the first related record to each parent, or null
    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let dictionary = self.build_dictionary(query.get(true)?);

        for model in models.iter_mut() {
            let related = model
                .key(self.keys.local())
                .and_then(|key| dictionary.first(&DictionaryKey::encode(&key)).cloned());
            model.set_relation(name, RelationValue::from_option(related));
        }

        Ok(())
    }

    /// Build model dictionary keyed by the relation's foreign key
    fn build_dictionary(&self, results: Vec<Model>) -> Dictionary<Model> {
        map_to_dictionary(results, |result| {
            let key = DictionaryKey::of(result.attributes(), self.keys.foreign())?;
            Some((key, result))
        })
    }

    pub fn make(&self, database: &Database, raw: Option<&serde_json::Value>) -> ModelResult<RelationValue> {
        make_one(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        registered(database, &self.parent)?.require_fields(self.keys.local(), "Local key")?;
        registered(database, &self.related)?.require_fields(self.keys.foreign(), "Foreign key")
    }
}
