//! BelongsTo Relationship - Parent references its owner
//!
//! The foreign key lives on the parent and points at the related model's
//! owner key, the reverse of HasOne.

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::{map_to_dictionary, Dictionary};
use super::keys::{collect_keys, where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_one, registered};

/// BelongsTo relationship - parent model belongs to an owner model
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsTo {
    parent: String,
    related: String,
    // foreign side on the parent, local side is the owner key
    keys: KeyPairs,
}

impl BelongsTo {
    /// Create a new BelongsTo relationship
    pub fn new(
        parent: &str,
        related: &str,
        foreign_key: impl Into<KeySpec>,
        owner_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        Ok(Self {
            parent: parent.to_string(),
            related: related.to_string(),
            keys: KeyPairs::new(foreign_key, owner_key)?,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    /// Foreign key on the parent model
    pub fn foreign_key(&self) -> &KeySpec {
        self.keys.foreign()
    }

    /// Owner key on the related model
    pub fn owner_key(&self) -> &KeySpec {
        self.keys.local()
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.one(&self.related, &self.parent)
    }

    /// Copy the child's owner key into the parent's foreign key
    pub fn attach(&self, record: &mut Element, child: &Element) {
        self.keys.copy_local_to_foreign(child, record);
    }

    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, models: &[Model]) -> Q {
        where_keys_in(query, self.owner_key(), collect_keys(models, self.foreign_key()))
    }

    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let dictionary = self.build_dictionary(query.get(true)?);

        for model in models.iter_mut() {
            let owner = model
                .key(self.foreign_key())
                .and_then(|key| dictionary.first(&DictionaryKey::encode(&key)).cloned());
            model.set_relation(name, RelationValue::from_option(owner));
        }

        Ok(())
    }

    /// Build model dictionary keyed by the owner key
    fn build_dictionary(&self, results: Vec<Model>) -> Dictionary<Model> {
        map_to_dictionary(results, |result| {
            let key = DictionaryKey::of(result.attributes(), self.owner_key())?;
            Some((key, result))
        })
    }

    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_one(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        registered(database, &self.parent)?.require_fields(self.foreign_key(), "Foreign key")?;
        registered(database, &self.related)?.require_fields(self.owner_key(), "Owner key")
    }
}
