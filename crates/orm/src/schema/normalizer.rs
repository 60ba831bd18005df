//! Schema Normalizer - Flattens nested payloads into per-model tables
//!
//! Each relation field present in a record is normalized according to the
//! relation's schema: the nested record(s) are keyed with `attach` first,
//! extracted into their own model's table and replaced in the parent by a
//! key reference. Records sharing a key are merged field by field, later
//! values winning, except HasManyBy key arrays, which collect the keys of
//! every parent.

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::OrmConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::{Database, Element};
use crate::relationships::{DictionaryKey, Relation, PIVOT};
use crate::store::Table;

use super::builder::{NormalizationSchema, SchemaBuilder};

/// Flat tables produced by one normalization pass plus the root references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedData {
    entities: IndexMap<String, Table>,
    result: Value,
}

impl NormalizedData {
    /// Records of `entity`, keyed by encoded primary key
    pub fn table(&self, entity: &str) -> Option<&Table> {
        self.entities.get(entity)
    }

    /// Entities with at least one record, in discovery order
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Key reference(s) of the root record(s): a single reference for an
    /// object payload, an array for an array payload
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Total number of records across all tables
    pub fn record_count(&self) -> usize {
        self.entities.values().map(Table::len).sum()
    }

    /// Consume the data, yielding the tables
    pub fn into_entities(self) -> IndexMap<String, Table> {
        self.entities
    }

    fn insert(&mut self, database: &Database, entity: &str, key: DictionaryKey, record: Element) {
        let table = self.entities.entry(entity.to_string()).or_default();
        match table.get_mut(&key) {
            Some(existing) => database.merge_record(entity, existing, record),
            None => {
                table.insert(key, record);
            }
        }
    }
}

/// Walks nested payloads guided by the relations of each model
pub struct Normalizer<'a> {
    database: &'a Database,
    config: &'a OrmConfig,
    schema: SchemaBuilder,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer over the models of `database`
    pub fn new(database: &'a Database, config: &'a OrmConfig) -> Self {
        Self {
            database,
            config,
            schema: SchemaBuilder::new(),
        }
    }

    /// Normalize a record or an array of records of `entity`
    pub fn normalize(&self, entity: &str, payload: &Value) -> ModelResult<NormalizedData> {
        self.database.model(entity)?;
        tracing::debug!("Normalizing '{}' payload", entity);

        let mut data = NormalizedData::default();
        let result = match payload {
            Value::Array(items) => {
                let mut references = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let path = format!("{}[{}]", entity, index);
                    let record = expect_record(item, &path)?;
                    references.push(self.visit(&mut data, entity, record, &path, 0)?);
                }
                Value::Array(references)
            }
            other => {
                let record = expect_record(other, entity)?;
                self.visit(&mut data, entity, record, entity, 0)?
            }
        };
        data.result = result;

        tracing::debug!(
            "Normalized '{}' into {} table(s) holding {} record(s)",
            entity,
            data.entities.len(),
            data.record_count()
        );
        Ok(data)
    }

    /// Normalize one record and return its key reference
    fn visit(
        &self,
        data: &mut NormalizedData,
        entity: &str,
        mut record: Element,
        path: &str,
        depth: usize,
    ) -> ModelResult<Value> {
        if depth > self.config.max_depth {
            return Err(ModelError::Normalization(format!(
                "Payload at '{}' is nested deeper than {} level(s)",
                path, self.config.max_depth
            )));
        }

        let definition = self.database.model(entity)?;

        for (name, relation) in definition.relations() {
            let Some(nested) = record.remove(name) else {
                continue;
            };
            let field_path = format!("{}.{}", path, name);
            let reference = self.visit_relation(data, relation, &mut record, nested, &field_path, depth)?;
            record.insert(name.to_string(), reference);
        }

        let key = definition
            .key_spec()
            .values(&record)
            .ok_or_else(|| ModelError::MissingPrimaryKey {
                entity: entity.to_string(),
                path: path.to_string(),
            })?;

        let reference = definition.key_spec().reference(key.clone());
        data.insert(self.database, entity, DictionaryKey::encode(&key), record);
        Ok(reference)
    }

    /// Normalize the value nested under one relation field of `record`
    fn visit_relation(
        &self,
        data: &mut NormalizedData,
        relation: &Relation,
        record: &mut Element,
        nested: Value,
        path: &str,
        depth: usize,
    ) -> ModelResult<Value> {
        if nested.is_null() {
            return Ok(Value::Null);
        }

        match relation.define(&self.schema) {
            NormalizationSchema::Entity(entity) | NormalizationSchema::One { entity, .. } => {
                let child = expect_record(&nested, path)?;
                self.visit_child(data, relation, record, child, &entity, path, depth)
            }
            NormalizationSchema::Many { entity, .. } => {
                let Value::Array(items) = nested else {
                    return Err(ModelError::Normalization(format!(
                        "Expected an array of '{}' records at '{}'",
                        entity, path
                    )));
                };

                let mut references = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, index);
                    let child = expect_record(item, &item_path)?;
                    references.push(self.visit_child(data, relation, record, child, &entity, &item_path, depth)?);
                }
                Ok(Value::Array(references))
            }
            NormalizationSchema::Union {
                entities,
                type_field,
                ..
            } => {
                let entity = record
                    .get(&type_field)
                    .and_then(Value::as_str)
                    .filter(|entity| entities.iter().any(|e| e.as_str() == *entity))
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ModelError::Normalization(format!(
                            "Record at '{}' needs '{}' set to one of [{}]",
                            path,
                            type_field,
                            entities.join(", ")
                        ))
                    })?;

                let child = expect_record(&nested, path)?;
                let id = self.visit_child(data, relation, record, child, &entity, path, depth)?;

                let mut reference = Element::new();
                reference.insert("id".to_string(), id);
                reference.insert("schema".to_string(), Value::String(entity));
                Ok(Value::Object(reference))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_child(
        &self,
        data: &mut NormalizedData,
        relation: &Relation,
        record: &mut Element,
        mut child: Element,
        entity: &str,
        path: &str,
        depth: usize,
    ) -> ModelResult<Value> {
        relation.attach(record, &mut child, entity);

        let pivot = match relation.pivot_entity() {
            Some(pivot_entity) => child.remove(PIVOT).map(|pivot| (pivot_entity, pivot)),
            None => None,
        };

        let reference = self.visit(data, entity, child, path, depth + 1)?;

        if let Some((pivot_entity, pivot)) = pivot {
            let pivot_path = format!("{}.{}", path, PIVOT);
            let pivot = expect_record(&pivot, &pivot_path)?;
            self.visit(data, pivot_entity, pivot, &pivot_path, depth + 1)?;
        }

        Ok(reference)
    }
}

fn expect_record(value: &Value, path: &str) -> ModelResult<Element> {
    match value {
        Value::Object(record) => Ok(record.clone()),
        other => Err(ModelError::Normalization(format!(
            "Expected a record at '{}', got {}",
            path, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;
    use serde_json::json;

    fn database() -> Database {
        Database::builder()
            .register(
                ModelDefinition::new("users")
                    .attr("name")
                    .relation("posts", Relation::has_many("users", "posts", "user_id", "id").unwrap())
                    .relation("roles", Relation::belongs_to_many("users", "roles", "role_user", "user_id", "role_id", "id", "id").unwrap()),
            )
            .register(
                ModelDefinition::new("posts")
                    .attr("user_id")
                    .attr("title")
                    .relation("author", Relation::belongs_to("posts", "users", "user_id", "id").unwrap())
                    .relation("comments", Relation::morph_many("posts", "comments", "commentable_id", "commentable_type", "id").unwrap()),
            )
            .register(
                ModelDefinition::new("videos")
                    .attr("url")
                    .relation("comments", Relation::morph_many("videos", "comments", "commentable_id", "commentable_type", "id").unwrap()),
            )
            .register(
                ModelDefinition::new("comments")
                    .attr("body")
                    .attr("commentable_id")
                    .attr("commentable_type")
                    .relation(
                        "commentable",
                        Relation::morph_to("comments", ["posts", "videos"], "commentable_id", "commentable_type", "id").unwrap(),
                    ),
            )
            .register(ModelDefinition::new("roles").attr("name"))
            .register(
                ModelDefinition::new("role_user")
                    .primary_key(["user_id", "role_id"])
                    .attr("level"),
            )
            .build()
            .unwrap()
    }

    fn row<'d>(data: &'d NormalizedData, entity: &str, key: Value) -> &'d Element {
        data.table(entity)
            .and_then(|table| table.get(&DictionaryKey::from_value(&key)))
            .unwrap_or_else(|| panic!("no {} record with key {}", entity, key))
    }

    #[test]
    fn test_normalizes_nested_has_many_and_attaches_keys() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize(
                "users",
                &json!({
                    "id": 1,
                    "name": "Ann",
                    "posts": [
                        { "id": 10, "title": "First" },
                        { "id": 11, "title": "Second" }
                    ]
                }),
            )
            .unwrap();

        assert_eq!(data.result(), &json!(1));
        assert_eq!(row(&data, "users", json!(1)).get("posts"), Some(&json!([10, 11])));
        assert_eq!(row(&data, "posts", json!(10)).get("user_id"), Some(&json!(1)));
        assert_eq!(row(&data, "posts", json!(11)).get("user_id"), Some(&json!(1)));
    }

    #[test]
    fn test_belongs_to_writes_parent_foreign_key() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize("posts", &json!([{ "id": 10, "author": { "id": 7, "name": "Bo" } }]))
            .unwrap();

        assert_eq!(data.result(), &json!([10]));
        assert_eq!(row(&data, "posts", json!(10)).get("user_id"), Some(&json!(7)));
        assert_eq!(row(&data, "posts", json!(10)).get("author"), Some(&json!(7)));
        assert!(data.table("users").is_some());
    }

    #[test]
    fn test_duplicate_keys_merge_later_wins() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize(
                "posts",
                &json!([
                    { "id": 10, "author": { "id": 7, "name": "Old" } },
                    { "id": 11, "author": { "id": 7, "name": "New" } }
                ]),
            )
            .unwrap();

        assert_eq!(data.table("users").map(Table::len), Some(1));
        assert_eq!(row(&data, "users", json!(7)).get("name"), Some(&json!("New")));
    }

    #[test]
    fn test_pivot_rows_are_extracted() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize(
                "users",
                &json!({
                    "id": 1,
                    "roles": [
                        { "id": 5, "name": "admin", "pivot": { "level": 3 } },
                        { "id": 6, "name": "editor" }
                    ]
                }),
            )
            .unwrap();

        let pivots = data.table("role_user").unwrap();
        assert_eq!(pivots.len(), 2);
        let admin = pivots
            .get(&DictionaryKey::encode(&[json!(1), json!(5)]))
            .unwrap();
        assert_eq!(admin.get("level"), Some(&json!(3)));
        assert!(row(&data, "roles", json!(5)).get(PIVOT).is_none());
    }

    #[test]
    fn test_morph_to_union_reference() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize(
                "comments",
                &json!({
                    "id": 100,
                    "body": "Nice",
                    "commentable_type": "videos",
                    "commentable": { "id": 3, "url": "v.mp4" }
                }),
            )
            .unwrap();

        let comment = row(&data, "comments", json!(100));
        assert_eq!(comment.get("commentable"), Some(&json!({ "id": 3, "schema": "videos" })));
        assert_eq!(comment.get("commentable_id"), Some(&json!(3)));
        assert!(data.table("videos").is_some());
    }

    #[test]
    fn test_morph_many_sets_type_discriminator() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize("posts", &json!({ "id": 10, "comments": [{ "id": 100 }] }))
            .unwrap();

        let comment = row(&data, "comments", json!(100));
        assert_eq!(comment.get("commentable_id"), Some(&json!(10)));
        assert_eq!(comment.get("commentable_type"), Some(&json!("posts")));
    }

    #[test]
    fn test_morph_to_without_type_fails() {
        let database = database();
        let config = OrmConfig::default();
        let err = Normalizer::new(&database, &config)
            .normalize("comments", &json!({ "id": 100, "commentable": { "id": 3 } }))
            .unwrap_err();
        assert!(matches!(err, ModelError::Normalization(_)));
    }

    #[test]
    fn test_missing_nested_primary_key_reports_path() {
        let database = database();
        let config = OrmConfig::default();
        let err = Normalizer::new(&database, &config)
            .normalize("users", &json!([{ "id": 1, "posts": [{ "id": 10 }, { "title": "no key" }] }]))
            .unwrap_err();

        assert_eq!(
            err,
            ModelError::MissingPrimaryKey {
                entity: "posts".to_string(),
                path: "users[0].posts[1]".to_string(),
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let database = database();
        let config = OrmConfig::default().with_max_depth(1);
        let err = Normalizer::new(&database, &config)
            .normalize(
                "users",
                &json!({ "id": 1, "posts": [{ "id": 10, "comments": [{ "id": 100 }] }] }),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::Normalization(_)));
    }

    #[test]
    fn test_null_relation_stays_null() {
        let database = database();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize("posts", &json!({ "id": 10, "author": null }))
            .unwrap();
        assert_eq!(row(&data, "posts", json!(10)).get("author"), Some(&Value::Null));
        assert!(data.table("users").is_none());
    }

    #[test]
    fn test_shared_has_many_by_child_lists_every_parent() {
        let database = Database::builder()
            .register(
                ModelDefinition::new("clusters")
                    .relation("nodes", Relation::has_many_by("clusters", "nodes", "cluster_ids", "id").unwrap()),
            )
            .register(ModelDefinition::new("nodes").attr("cluster_ids"))
            .build()
            .unwrap();
        let config = OrmConfig::default();
        let data = Normalizer::new(&database, &config)
            .normalize(
                "clusters",
                &json!([
                    { "id": 1, "nodes": [{ "id": 10 }] },
                    { "id": 2, "nodes": [{ "id": 10 }, { "id": 11 }] }
                ]),
            )
            .unwrap();

        assert_eq!(row(&data, "nodes", json!(10)).get("cluster_ids"), Some(&json!([1, 2])));
        assert_eq!(row(&data, "nodes", json!(11)).get("cluster_ids"), Some(&json!([2])));
    }
}
