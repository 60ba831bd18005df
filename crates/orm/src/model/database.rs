//! Model Registry - Validated set of model definitions
//!
//! Definitions are registered on a `DatabaseBuilder`; `build` checks every
//! relation against the complete set and freezes it. A built `Database` is
//! immutable and can be shared across threads behind an `Arc`.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};
use crate::relationships::Relation;

use super::definition::ModelDefinition;
use super::instance::{Element, Model};

/// Collects model definitions before validation
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    models: Vec<ModelDefinition>,
}

impl DatabaseBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model definition
    pub fn register(mut self, definition: ModelDefinition) -> Self {
        self.models.push(definition);
        self
    }

    /// Validate every definition and freeze the registry
    pub fn build(self) -> ModelResult<Database> {
        let mut models = IndexMap::with_capacity(self.models.len());
        for definition in self.models {
            let entity = definition.entity().to_string();
            if models.contains_key(&entity) {
                return Err(ModelError::Configuration(format!(
                    "Model '{}' is registered more than once",
                    entity
                )));
            }
            models.insert(entity, definition);
        }

        let mut database = Database {
            models,
            key_arrays: HashMap::new(),
        };
        for definition in database.models.values() {
            definition.validate(&database)?;
        }

        let mut key_arrays: HashMap<String, Vec<String>> = HashMap::new();
        for definition in database.models.values() {
            for (_, relation) in definition.relations() {
                if let Relation::HasManyBy(relation) = relation {
                    let fields = key_arrays.entry(relation.related().to_string()).or_default();
                    if !fields.iter().any(|field| field == relation.foreign_key()) {
                        fields.push(relation.foreign_key().to_string());
                    }
                }
            }
        }
        database.key_arrays = key_arrays;

        tracing::debug!(
            "Built model registry with {} model(s): {:?}",
            database.models.len(),
            database.entities().collect::<Vec<_>>()
        );

        Ok(database)
    }
}

/// Immutable registry of model definitions
#[derive(Debug)]
pub struct Database {
    models: IndexMap<String, ModelDefinition>,
    // entity -> array fields listing parent keys of a HasManyBy relation
    key_arrays: HashMap<String, Vec<String>>,
}

impl Database {
    /// Start registering model definitions
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Look up a model definition, failing for unregistered entities
    pub fn model(&self, entity: &str) -> ModelResult<&ModelDefinition> {
        self.models
            .get(entity)
            .ok_or_else(|| ModelError::UnknownModel(entity.to_string()))
    }

    /// Look up a model definition
    pub fn get(&self, entity: &str) -> Option<&ModelDefinition> {
        self.models.get(entity)
    }

    /// Returns true if `entity` is registered
    pub fn contains(&self, entity: &str) -> bool {
        self.models.contains_key(entity)
    }

    /// Registered entity names in registration order
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Look up a relation declared on `entity`
    pub fn relation(&self, entity: &str, name: &str) -> ModelResult<&Relation> {
        self.model(entity)?.get_relation(name).ok_or_else(|| {
            ModelError::Relationship(format!(
                "Relation '{}' is not defined on '{}'",
                name, entity
            ))
        })
    }

    /// Fields of `entity` holding the parent keys of a HasManyBy relation
    pub fn key_array_fields(&self, entity: &str) -> &[String] {
        self.key_arrays.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merge `record` into `existing`, later values winning.
    ///
    /// Key-array fields of `entity` are combined instead: the result holds
    /// every key of both sides without repeats, existing keys first.
    pub fn merge_record(&self, entity: &str, existing: &mut Element, record: Element) {
        let key_arrays = self.key_array_fields(entity);
        for (field, value) in record {
            if key_arrays.contains(&field) {
                if let Some(current) = existing.get_mut(&field) {
                    union_keys(current, value);
                    continue;
                }
            }
            existing.insert(field, value);
        }
    }

    /// Build an instance of `entity` from a raw record.
    ///
    /// Declared attributes take the record's value or their default. Relation
    /// fields present in the record are built through the relation's `make`,
    /// without touching any store. Undeclared fields are dropped.
    pub fn new_instance(&self, entity: &str, element: &Element) -> ModelResult<Model> {
        let definition = self.model(entity)?;

        let mut attributes = Element::new();
        for field in definition.key_spec().fields() {
            if let Some(value) = element.get(field) {
                attributes.insert(field.clone(), value.clone());
            }
        }
        for (name, attribute) in definition.attributes() {
            let value = element
                .get(name)
                .cloned()
                .unwrap_or_else(|| attribute.default_value().clone());
            attributes.insert(name.to_string(), value);
        }

        let mut model = Model::new(entity, attributes);
        for (name, relation) in definition.relations() {
            let Some(raw) = element.get(name) else {
                continue;
            };

            let morph_type = relation
                .morph_type_field()
                .and_then(|field| element.get(field))
                .and_then(Value::as_str);

            let value = relation.make(self, Some(raw), morph_type)?;
            model.set_relation(name, value);
        }

        Ok(model)
    }
}

/// Append the keys of `incoming` missing from `current`; scalars count as
/// one-element arrays and nulls as empty ones
fn union_keys(current: &mut Value, incoming: Value) {
    let mut keys = match current.take() {
        Value::Null => Vec::new(),
        Value::Array(keys) => keys,
        scalar => vec![scalar],
    };
    let incoming = match incoming {
        Value::Null => Vec::new(),
        Value::Array(keys) => keys,
        scalar => vec![scalar],
    };
    for key in incoming {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    *current = Value::Array(keys);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationValue;
    use serde_json::json;

    fn element(value: Value) -> Element {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn blog() -> ModelResult<Database> {
        Database::builder()
            .register(
                ModelDefinition::new("users")
                    .attr("name")
                    .relation("posts", Relation::has_many("users", "posts", "user_id", "id")?),
            )
            .register(
                ModelDefinition::new("posts")
                    .attr("user_id")
                    .attr("title")
                    .attr_default("published", json!(false))
                    .relation("author", Relation::belongs_to("posts", "users", "user_id", "id")?),
            )
            .build()
    }

    #[test]
    fn test_build_and_lookup() {
        let database = blog().unwrap();
        assert!(database.contains("users"));
        assert_eq!(database.entities().collect::<Vec<_>>(), vec!["users", "posts"]);
        assert!(database.relation("users", "posts").is_ok());
        assert!(matches!(
            database.relation("users", "comments"),
            Err(ModelError::Relationship(_))
        ));
        assert!(matches!(database.model("ghosts"), Err(ModelError::UnknownModel(_))));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let err = Database::builder()
            .register(ModelDefinition::new("users"))
            .register(ModelDefinition::new("users"))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_undeclared_related_model_fails() {
        let err = Database::builder()
            .register(
                ModelDefinition::new("users")
                    .relation("posts", Relation::has_many("users", "posts", "user_id", "id").unwrap()),
            )
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("users.posts"));
    }

    #[test]
    fn test_undeclared_foreign_key_fails() {
        let err = Database::builder()
            .register(
                ModelDefinition::new("users")
                    .relation("posts", Relation::has_many("users", "posts", "owner_id", "id").unwrap()),
            )
            .register(ModelDefinition::new("posts").attr("user_id"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("owner_id"));
    }

    #[test]
    fn test_relation_parent_mismatch_fails() {
        let err = Database::builder()
            .register(
                ModelDefinition::new("users")
                    .relation("posts", Relation::has_many("authors", "posts", "user_id", "id").unwrap()),
            )
            .register(ModelDefinition::new("posts").attr("user_id"))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_new_instance_fills_defaults_and_makes_relations() {
        let database = blog().unwrap();
        let user = database
            .new_instance(
                "users",
                &element(json!({
                    "id": 1,
                    "unknown": "dropped",
                    "posts": [{ "id": 10, "title": "Hello" }]
                })),
            )
            .unwrap();

        assert_eq!(user.get("name"), Some(&Value::Null));
        assert!(user.get("unknown").is_none());

        let posts = user.relation("posts").and_then(RelationValue::as_many).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].get("published"), Some(&json!(false)));
        assert_eq!(posts[0].get("title"), Some(&json!("Hello")));
    }

    #[test]
    fn test_merge_record_unions_key_arrays() {
        let database = Database::builder()
            .register(
                ModelDefinition::new("clusters")
                    .relation("nodes", Relation::has_many_by("clusters", "nodes", "cluster_ids", "id").unwrap()),
            )
            .register(ModelDefinition::new("nodes").attr("cluster_ids").attr("name"))
            .build()
            .unwrap();
        assert_eq!(database.key_array_fields("nodes"), ["cluster_ids".to_string()]);
        assert!(database.key_array_fields("clusters").is_empty());

        let mut existing = element(json!({ "id": 10, "cluster_ids": [1, 2], "name": "old" }));
        database.merge_record(
            "nodes",
            &mut existing,
            element(json!({ "id": 10, "cluster_ids": [2, 3], "name": "new" })),
        );
        assert_eq!(
            Value::Object(existing.clone()),
            json!({ "id": 10, "cluster_ids": [1, 2, 3], "name": "new" })
        );

        database.merge_record("nodes", &mut existing, element(json!({ "cluster_ids": 4 })));
        assert_eq!(existing.get("cluster_ids"), Some(&json!([1, 2, 3, 4])));
    }
}
