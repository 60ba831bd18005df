//! MorphMany Relationship - Polymorphic one-to-many

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::keys::{DictionaryKey, KeyPairs};
use super::morph_one::{attach_morph, morph_constraints, morph_dictionary, validate_morph};
use super::relation::{make_many, require_type_field};

/// MorphMany relationship - parent has many polymorphic related models
#[derive(Debug, Clone, PartialEq)]
pub struct MorphMany {
    parent: String,
    related: String,
    keys: KeyPairs,
    type_field: String,
}

impl MorphMany {
    /// Create a new MorphMany relationship
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

    pub fn id(&self) -> &KeySpec {
        self.keys.foreign()
    }

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
        schema.many(&self.related, &self.parent)
    }

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
                .map(|key| dictionary.cloned(&DictionaryKey::encode(&key)))
                .unwrap_or_default();
            model.set_relation(name, RelationValue::Many(related));
        }

        Ok(())
    }

    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_many(database, &self.related, raw)
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        validate_morph(database, &self.keys, &self.type_field, &self.parent, &self.related)
    }
}
