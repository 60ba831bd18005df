//! BelongsToMany Relationship - Many-to-many through pivot rows
//!
//! Pivot rows pair the parent's `parent_key` (as `foreign_pivot_key`) with the
//! related model's `related_key` (as `related_pivot_key`). Matching composes
//! two dictionaries: parent key to pivot rows, then pivot row to related
//! record. Every matched related record carries its pivot row in the
//! [`PIVOT`] slot.

use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element, KeySpec, Model, RelationValue};
use crate::query::RelationQuery;
use crate::schema::{NormalizationSchema, SchemaBuilder};

use super::dictionary::map_to_dictionary;
use super::keys::{collect_keys, where_keys_in, DictionaryKey, KeyPairs};
use super::relation::{make_many_with, registered, PIVOT};

/// BelongsToMany relationship - many-to-many through a pivot model
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsToMany {
    parent: String,
    related: String,
    pivot: String,
    // foreign_pivot_key on the pivot <- parent_key on the parent
    parent_pivot: KeyPairs,
    // related_pivot_key on the pivot <- related_key on the related model
    related_pivot: KeyPairs,
}

impl BelongsToMany {
    /// Create a new BelongsToMany relationship
    pub fn new(
        parent: &str,
        related: &str,
        pivot: &str,
        foreign_pivot_key: impl Into<KeySpec>,
        related_pivot_key: impl Into<KeySpec>,
        parent_key: impl Into<KeySpec>,
        related_key: impl Into<KeySpec>,
    ) -> ModelResult<Self> {
        Ok(Self {
            parent: parent.to_string(),
            related: related.to_string(),
            pivot: pivot.to_string(),
            parent_pivot: KeyPairs::new(foreign_pivot_key, parent_key)?,
            related_pivot: KeyPairs::new(related_pivot_key, related_key)?,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    /// The pivot model
    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    pub fn foreign_pivot_key(&self) -> &KeySpec {
        self.parent_pivot.foreign()
    }

    pub fn related_pivot_key(&self) -> &KeySpec {
        self.related_pivot.foreign()
    }

    pub fn parent_key(&self) -> &KeySpec {
        self.parent_pivot.local()
    }

    pub fn related_key(&self) -> &KeySpec {
        self.related_pivot.local()
    }

    pub fn related_entities(&self) -> Vec<&str> {
        vec![self.related.as_str()]
    }

    pub fn define(&self, schema: &SchemaBuilder) -> NormalizationSchema {
        schema.many(&self.related, &self.parent)
    }

    /// Write both keys into the child's pivot record, keeping any extra
    /// pivot fields already present
    pub fn attach(&self, record: &Element, child: &mut Element) {
        let mut pivot = match child.remove(PIVOT) {
            Some(Value::Object(pivot)) => pivot,
            _ => Element::new(),
        };
        self.parent_pivot.copy_local_to_foreign(record, &mut pivot);
        self.related_pivot.copy_local_to_foreign(child, &mut pivot);
        child.insert(PIVOT.to_string(), Value::Object(pivot));
    }

    /// The related keys come from the pivot rows, which are read once while
    /// matching so narrowing and matching see the same rows
    pub fn add_eager_constraints<Q: RelationQuery>(&self, query: Q, _models: &[Model]) -> Q {
        query
    }

    pub fn match_models<Q: RelationQuery>(&self, name: &str, models: &mut [Model], query: Q) -> ModelResult<()> {
        let pivots = self.pivot_rows(&query, models)?;
        let keys = collect_keys(&pivots, self.related_pivot_key());
        let results = where_keys_in(query, self.related_key(), keys).get(true)?;

        let pivot_dictionary = map_to_dictionary(pivots, |pivot| {
            let key = DictionaryKey::of(pivot.attributes(), self.foreign_pivot_key())?;
            Some((key, pivot))
        });
        let related_dictionary = map_to_dictionary(results.iter().enumerate(), |(index, result)| {
            let key = DictionaryKey::of(result.attributes(), self.related_key())?;
            Some((key, index))
        });

        for model in models.iter_mut() {
            let mut matched: Vec<(usize, &Model)> = Vec::new();
            if let Some(key) = DictionaryKey::of(model.attributes(), self.parent_key()) {
                for pivot in pivot_dictionary.get(&key).unwrap_or_default() {
                    let index = DictionaryKey::of(pivot.attributes(), self.related_pivot_key())
                        .and_then(|related| related_dictionary.first(&related).copied());
                    if let Some(index) = index {
                        matched.push((index, pivot));
                    }
                }
            }

            matched.sort_by_key(|(index, _)| *index);
            matched.dedup_by_key(|(index, _)| *index);

            let related = matched
                .into_iter()
                .map(|(index, pivot)| {
                    let mut related = results[index].clone();
                    related.set_relation(PIVOT, RelationValue::One(Box::new(pivot.clone())));
                    related
                })
                .collect();
            model.set_relation(name, RelationValue::Many(related));
        }

        Ok(())
    }

    /// Pivot rows reachable from `models`
    fn pivot_rows<Q: RelationQuery>(&self, query: &Q, models: &[Model]) -> ModelResult<Vec<Model>> {
        let keys = collect_keys(models, self.parent_key());
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let pivots = query.new_query(&self.pivot)?;
        where_keys_in(pivots, self.foreign_pivot_key(), keys).get(false)
    }

    /// Build related instances; a nested `pivot` record becomes the pivot slot
    pub fn make(&self, database: &Database, raw: Option<&Value>) -> ModelResult<RelationValue> {
        make_many_with(database, &self.related, raw, |model, element| {
            if let Some(Value::Object(pivot)) = element.get(PIVOT) {
                let pivot = database.new_instance(&self.pivot, pivot)?;
                model.set_relation(PIVOT, RelationValue::One(Box::new(pivot)));
            }
            Ok(())
        })
    }

    pub fn validate(&self, database: &Database) -> ModelResult<()> {
        registered(database, &self.parent)?.require_fields(self.parent_key(), "Parent key")?;
        registered(database, &self.related)?.require_fields(self.related_key(), "Related key")?;
        let pivot = registered(database, &self.pivot)?;
        pivot.require_fields(self.foreign_pivot_key(), "Foreign pivot key")?;
        pivot.require_fields(self.related_pivot_key(), "Related pivot key")?;

        // Pivot records are built from the two pivot keys only, so its
        // primary key has to be made of them.
        let pivot_keys = self.foreign_pivot_key().fields().iter().chain(self.related_pivot_key().fields());
        let pivot_keys: Vec<&String> = pivot_keys.collect();
        if let Some(field) = pivot.key_spec().fields().iter().find(|field| !pivot_keys.contains(field)) {
            return Err(ModelError::Configuration(format!(
                "Pivot model '{}' key field '{}' is not one of its pivot keys",
                self.pivot, field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;
    use crate::relationships::Relation;
    use serde_json::json;

    #[test]
    fn test_attach_builds_pivot_record() {
        let relation = BelongsToMany::new("users", "roles", "role_user", "user_id", "role_id", "id", "id").unwrap();
        let Value::Object(user) = json!({ "id": 1 }) else { unreachable!() };
        let Value::Object(mut role) = json!({ "id": 5, "pivot": { "level": "admin" } }) else { unreachable!() };

        relation.attach(&user, &mut role);

        assert_eq!(
            role.get(PIVOT),
            Some(&json!({ "level": "admin", "user_id": 1, "role_id": 5 }))
        );
    }

    #[test]
    fn test_pivot_key_must_come_from_pivot_keys() {
        let build = |pivot: ModelDefinition| {
            Database::builder()
                .register(ModelDefinition::new("users").relation(
                    "roles",
                    Relation::belongs_to_many("users", "roles", "role_user", "user_id", "role_id", "id", "id").unwrap(),
                ))
                .register(ModelDefinition::new("roles"))
                .register(pivot)
                .build()
        };

        let err = build(ModelDefinition::new("role_user").attr("user_id").attr("role_id")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("'id'"));

        assert!(build(ModelDefinition::new("role_user").primary_key(["user_id", "role_id"])).is_ok());
    }
}
